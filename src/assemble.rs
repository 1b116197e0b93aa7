//! Candidate file assembly.
//!
//! A candidate is the source body re-wrapped for one trim hypothesis:
//!
//! ```text
//! [ header (12 B) | header CRC = 0 (2 B) | payload | file CRC (2 B) ]
//! ```
//!
//! The payload starts at source offset 14 and stops `trim + 2` bytes before
//! the end of the source: `trim` garbage bytes plus the stale CRC slot.  The
//! header is always written as a 14-byte header and the file CRC is
//! recomputed over everything before it.

use thiserror::Error;

use crate::crc::{Crc, CRC_SIZE};
use crate::header::{self, FileHeader, HeaderError, HEADER_SIZE};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    #[error("Trim of {trim} bytes leaves no room for a payload in a {len}-byte file")]
    ImpossibleTrim { trim: usize, len: usize },
}

/// The damaged input.  Read once and never modified.
#[derive(Debug, Clone)]
pub struct CorruptedFile {
    bytes:  Vec<u8>,
    header: FileHeader,
}

impl CorruptedFile {
    pub fn new(bytes: Vec<u8>) -> Result<Self, HeaderError> {
        let header = header::decode(&bytes)?;
        Ok(Self { bytes, header })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Largest trim that still leaves a non-negative payload length.
    pub fn trim_max(&self) -> usize {
        self.bytes.len().saturating_sub(HEADER_SIZE + CRC_SIZE)
    }

    /// Payload length a repaired file would carry after dropping `trim` bytes.
    pub fn data_size_for(&self, trim: usize) -> Result<u32, AssembleError> {
        self.bytes
            .len()
            .checked_sub(HEADER_SIZE + CRC_SIZE)
            .and_then(|n| n.checked_sub(trim))
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(AssembleError::ImpossibleTrim { trim, len: self.bytes.len() })
    }
}

/// A sealed buffer for one trim hypothesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub trim:      usize,
    pub data_size: u32,
    pub checksum:  u16,
    bytes:         Vec<u8>,
}

impl CandidateFile {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Build the candidate for `trim`.
pub fn assemble(original: &CorruptedFile, trim: usize) -> Result<CandidateFile, AssembleError> {
    let data_size = original.data_size_for(trim)?;
    let payload_end = HEADER_SIZE + data_size as usize;
    let payload = &original.bytes()[HEADER_SIZE..payload_end];

    let mut fixed = original.header().clone();
    fixed.header_size = HEADER_SIZE as u8;
    let head = header::encode(&fixed, data_size);

    let mut bytes = Vec::with_capacity(payload_end + CRC_SIZE);
    bytes.extend_from_slice(&head);
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(payload);

    let mut crc = Crc::new();
    crc.update(&bytes);
    let checksum = crc.finalize();
    bytes.extend_from_slice(&checksum.to_le_bytes());

    Ok(CandidateFile { trim, data_size, checksum, bytes })
}
