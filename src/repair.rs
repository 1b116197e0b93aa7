//! High-level repair API: the only layer that touches the filesystem.
//!
//! ```no_run
//! use fitmend::repair::{repair_file, RepairOptions};
//!
//! let report = repair_file("ride.fit".as_ref(), &RepairOptions::default(), None)?;
//! println!("{}", report.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The input is read once.  The search runs entirely in memory, and the
//! output is written only after a candidate is accepted, so an unrecoverable
//! or cancelled run leaves nothing behind.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::assemble::{CandidateFile, CorruptedFile};
use crate::crc::{checksum, CRC_SIZE};
use crate::header::{self, HeaderError};
use crate::probe::{FitRecordProbe, ValidationProbe, WalkStats};
use crate::recovery::{Outcome, RecoveryReport, RecoverySearch, Rejection};

/// Suffix that replaces the last 4 characters of the input name.
pub const OUTPUT_SUFFIX: &str = "_rec.fit";

#[derive(Error, Debug)]
pub enum RepairError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("Unrecoverable after {attempts} attempt(s){}", last_error_suffix(.last_error))]
    Unrecoverable {
        attempts:   usize,
        last_error: Option<Rejection>,
    },
    #[error("Cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: usize },
}

fn last_error_suffix(e: &Option<Rejection>) -> String {
    e.as_ref().map(|e| format!(": last rejection: {e}")).unwrap_or_default()
}

// ── RepairOptions ─────────────────────────────────────────────────────────────

/// Configuration for [`repair_file`].
#[derive(Debug, Clone, Default)]
pub struct RepairOptions {
    /// Destination; derived from the input name when `None`.
    pub output:   Option<PathBuf>,
    /// Largest trim to try; bounded by the file size regardless.
    pub max_trim: Option<usize>,
    pub probe:    FitRecordProbe,
}

/// `ride.fit` → `ride_rec.fit`.  Names shorter than 4 characters get the
/// suffix appended.
pub fn derive_output_path(input: &Path) -> PathBuf {
    let name = input.to_string_lossy();
    let cut = name
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| i)
        .unwrap_or(name.len());
    PathBuf::from(format!("{}{OUTPUT_SUFFIX}", &name[..cut]))
}

/// Run the search over in-memory bytes.  No I/O.
pub fn repair_bytes<P, F>(
    file:     &CorruptedFile,
    probe:    &P,
    max_trim: Option<usize>,
    cancel:   Option<&AtomicBool>,
    progress: Option<&mut F>,
) -> Result<(CandidateFile, usize), RepairError>
where
    P: ValidationProbe + ?Sized,
    F: FnMut(usize, usize),
{
    let outcome = RecoverySearch::new(file, probe)
        .with_max_trim(max_trim)
        .run(cancel, progress);
    match outcome {
        Outcome::Recovered { candidate, attempts } => Ok((candidate, attempts)),
        Outcome::Unrecoverable { attempts, cancelled: true, .. } => {
            Err(RepairError::Cancelled { attempts })
        }
        Outcome::Unrecoverable { attempts, last_error, .. } => {
            Err(RepairError::Unrecoverable { attempts, last_error })
        }
    }
}

/// Repair `input` with the default probe and progress reporting disabled.
pub fn repair_file(
    input:  &Path,
    opts:   &RepairOptions,
    cancel: Option<&AtomicBool>,
) -> Result<RecoveryReport, RepairError> {
    repair_file_with_progress::<fn(usize, usize)>(input, opts, cancel, None)
}

pub fn repair_file_with_progress<F>(
    input:    &Path,
    opts:     &RepairOptions,
    cancel:   Option<&AtomicBool>,
    progress: Option<&mut F>,
) -> Result<RecoveryReport, RepairError>
where
    F: FnMut(usize, usize),
{
    let file = CorruptedFile::new(fs::read(input)?)?;
    let output = opts.output.clone().unwrap_or_else(|| derive_output_path(input));
    info!(
        input = %input.display(),
        size = file.len(),
        declared_data_size = file.header().data_size,
        trim_max = file.trim_max(),
        "starting recovery"
    );

    let (candidate, attempts) = repair_bytes(&file, &opts.probe, opts.max_trim, cancel, progress)?;

    let bytes = candidate.as_bytes();
    fs::write(&output, bytes)?;
    info!(output = %output.display(), trim = candidate.trim, "repaired file written");

    Ok(RecoveryReport {
        input:              input.display().to_string(),
        output:             output.display().to_string(),
        original_size:      file.len() as u64,
        repaired_size:      bytes.len() as u64,
        declared_data_size: file.header().data_size,
        repaired_data_size: candidate.data_size,
        trim:               candidate.trim,
        attempts,
        checksum:           candidate.checksum,
        content_hash:       blake3::hash(bytes).to_hex().to_string(),
    })
}

// ── Inspection ────────────────────────────────────────────────────────────────

/// Read-only diagnosis of a file as it is on disk.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub size:               u64,
    pub header_size:        u8,
    pub protocol_version:   u8,
    pub profile_version:    u16,
    pub declared_data_size: u32,
    /// `header_size + data_size + 2`, what the size should be.
    pub expected_size:      u64,
    pub signature:          String,
    pub signature_valid:    bool,
    pub header_crc:         Option<u16>,
    /// Last two bytes, read as a CRC.
    pub stored_crc:         Option<u16>,
    /// CRC over everything before the last two bytes.
    pub computed_crc:       Option<u16>,
    pub readable:           bool,
    pub problem:            Option<String>,
    pub stats:              Option<WalkStats>,
}

impl Inspection {
    pub fn size_matches(&self) -> bool {
        self.size == self.expected_size
    }

    pub fn crc_matches(&self) -> bool {
        self.stored_crc.is_some() && self.stored_crc == self.computed_crc
    }
}

pub fn inspect(bytes: &[u8], probe: &FitRecordProbe) -> Result<Inspection, HeaderError> {
    let hdr = header::decode(bytes)?;
    let (stored_crc, computed_crc) = match bytes.len().checked_sub(CRC_SIZE) {
        Some(body) => (
            Some(u16::from_le_bytes([bytes[body], bytes[body + 1]])),
            Some(checksum(&bytes[..body])),
        ),
        None => (None, None),
    };
    let walk = probe.walk(bytes);

    Ok(Inspection {
        size:               bytes.len() as u64,
        header_size:        hdr.header_size,
        protocol_version:   hdr.protocol_version,
        profile_version:    hdr.profile_version,
        declared_data_size: hdr.data_size,
        expected_size:      hdr.header_size as u64 + hdr.data_size as u64 + CRC_SIZE as u64,
        signature:          hex::encode(hdr.signature),
        signature_valid:    hdr.has_valid_signature(),
        header_crc:         hdr.header_crc,
        stored_crc,
        computed_crc,
        readable:           walk.is_ok(),
        problem:            walk.as_ref().err().map(|e| e.to_string()),
        stats:              walk.ok(),
    })
}

pub fn inspect_file(path: &Path, probe: &FitRecordProbe) -> Result<Inspection, RepairError> {
    Ok(inspect(&fs::read(path)?, probe)?)
}
