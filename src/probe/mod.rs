//! Validation probes: the "can a FIT reader enumerate this?" oracle.
//!
//! The recovery search never looks inside records itself.  It hands each
//! candidate buffer to a [`ValidationProbe`] and acts only on the verdict, so
//! any decoder (or a test double) can stand in.  Closures of type
//! `Fn(&[u8]) -> Result<(), ParseError>` implement the trait directly.
//!
//! [`FitRecordProbe`] is the built-in implementation: a structural walk over
//! every record that checks what a full FIT parser would trip on, without
//! decoding field values.

mod record;

pub use record::{FitRecordProbe, WalkStats};

use thiserror::Error;

/// Why a candidate buffer is not a readable FIT file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unexpected end of data at offset {offset} (needed {needed} more bytes)")]
    UnexpectedEof { offset: usize, needed: usize },
    #[error("Invalid header size {0}")]
    InvalidHeaderSize(u8),
    #[error("Invalid signature {0:02x?}")]
    InvalidSignature([u8; 4]),
    #[error("Header CRC mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    HeaderChecksumMismatch { stored: u16, computed: u16 },
    #[error("File CRC mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { stored: u16, computed: u16 },
    #[error("File contains no records")]
    EmptyPayload,
    #[error("Record at offset {offset} overruns the payload end at {end}")]
    RecordOverrun { offset: usize, end: usize },
    #[error("Data message at offset {offset} uses undefined local message type {local}")]
    UndefinedLocalMessage { local: u8, offset: usize },
    #[error("Invalid architecture {arch} in definition at offset {offset}")]
    InvalidArchitecture { arch: u8, offset: usize },
    #[error("Invalid base type {base_type:#04x} in definition at offset {offset}")]
    InvalidBaseType { base_type: u8, offset: usize },
    #[error("{0} trailing bytes after the file CRC")]
    TrailingBytes(usize),
    /// Verdict from an external decoder that has no structured error.
    #[error("Rejected: {0}")]
    Rejected(String),
}

/// Capability the recovery search depends on.
pub trait ValidationProbe {
    /// `Ok(())` only when every record in `candidate` parses.
    fn validate(&self, candidate: &[u8]) -> Result<(), ParseError>;
}

impl<F> ValidationProbe for F
where
    F: Fn(&[u8]) -> Result<(), ParseError>,
{
    fn validate(&self, candidate: &[u8]) -> Result<(), ParseError> {
        self(candidate)
    }
}
