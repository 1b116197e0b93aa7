pub mod search;

pub use search::{search, RecoverySearch};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assemble::{AssembleError, CandidateFile};
use crate::probe::ParseError;

/// Why one trim hypothesis failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error(transparent)]
    Impossible(#[from] AssembleError),
    #[error(transparent)]
    Invalid(#[from] ParseError),
}

/// Result of a single search step.
#[derive(Debug)]
pub enum Attempt {
    Accepted(CandidateFile),
    Rejected(Rejection),
}

/// Terminal state of a search.
#[derive(Debug)]
pub enum Outcome {
    Recovered {
        candidate: CandidateFile,
        attempts:  usize,
    },
    Unrecoverable {
        attempts:   usize,
        cancelled:  bool,
        /// Reason the last tried trim was rejected.
        last_error: Option<Rejection>,
    },
}

impl Outcome {
    pub fn is_recovered(&self) -> bool {
        matches!(self, Outcome::Recovered { .. })
    }

    pub fn attempts(&self) -> usize {
        match self {
            Outcome::Recovered { attempts, .. } | Outcome::Unrecoverable { attempts, .. } => *attempts,
        }
    }
}

/// What a successful repair did, as printed by the CLI.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    pub input:              String,
    pub output:             String,
    pub original_size:      u64,
    pub repaired_size:      u64,
    /// `data_size` the damaged header claimed.
    pub declared_data_size: u32,
    pub repaired_data_size: u32,
    pub trim:               usize,
    pub attempts:           usize,
    pub checksum:           u16,
    /// BLAKE3 of the repaired file, hex.
    pub content_hash:       String,
}

impl RecoveryReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn summary(&self) -> String {
        format!(
            "Recovered with trim {} after {} attempt(s): {} -> {} bytes, data size {} -> {}, CRC {:#06x}",
            self.trim,
            self.attempts,
            self.original_size,
            self.repaired_size,
            self.declared_data_size,
            self.repaired_data_size,
            self.checksum,
        )
    }
}
