//! Structural FIT record walker.
//!
//! # Record headers
//!
//! | Bits         | Meaning                                              |
//! |--------------|------------------------------------------------------|
//! | `1ttooooo`   | compressed-timestamp data message, local type `tt`   |
//! | `01d0llll`   | definition message, local type `llll`, `d` = dev data|
//! | `0000llll`   | normal data message, local type `llll`               |
//!
//! A definition binds a local type (0–15) to a field layout.  Data messages
//! only carry the field bytes, so their length is known only through the
//! last definition for their local type.  That makes the walk sensitive to
//! exactly the damage a truncated write leaves behind: a dangling partial
//! record, a data message for a slot that was never defined, or a definition
//! full of nonsense base types.

use serde::Serialize;

use super::ParseError;
use crate::crc::{checksum, CRC_SIZE};
use crate::header::{self, BASE_HEADER_SIZE, HEADER_SIZE};

const COMPRESSED_HEADER: u8 = 0x80;
const DEFINITION_HEADER: u8 = 0x40;
const DEV_DATA_FLAG:     u8 = 0x20;
const LOCAL_TYPE_MASK:   u8 = 0x0F;

/// reserved, architecture, global message number (2), field count
const DEFINITION_FIXED_SIZE: usize = 5;
const FIELD_DEFINITION_SIZE: usize = 3;

/// Highest base type number defined by the FIT profile (uint64z).
const MAX_BASE_TYPE_NUMBER: u8 = 0x10;
const BASE_TYPE_NUMBER_MASK: u8 = 0x1F;
const BASE_TYPE_RESERVED_MASK: u8 = 0x60;

#[derive(Debug, Clone, Copy)]
struct Definition {
    /// Bytes of field data following each data-message header.
    message_size: usize,
}

/// Counters from a successful walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub files:         usize,
    pub definitions:   usize,
    pub data_messages: usize,
}

/// The built-in [`ValidationProbe`](super::ValidationProbe).
#[derive(Debug, Clone, Copy)]
pub struct FitRecordProbe {
    /// Verify each file's trailing CRC.
    pub check_crc:     bool,
    /// Accept further FIT files after a file's CRC (chained files).
    pub allow_chained: bool,
}

impl Default for FitRecordProbe {
    fn default() -> Self {
        Self { check_crc: true, allow_chained: true }
    }
}

impl super::ValidationProbe for FitRecordProbe {
    fn validate(&self, candidate: &[u8]) -> Result<(), ParseError> {
        self.walk(candidate).map(|_| ())
    }
}

impl FitRecordProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk every file and record in `bytes`.
    pub fn walk(&self, bytes: &[u8]) -> Result<WalkStats, ParseError> {
        let mut stats = WalkStats::default();
        let mut pos = 0;
        loop {
            pos = self.walk_file(bytes, pos, &mut stats)?;
            stats.files += 1;
            if pos == bytes.len() {
                return Ok(stats);
            }
            if !self.allow_chained {
                return Err(ParseError::TrailingBytes(bytes.len() - pos));
            }
        }
    }

    /// Walk the file starting at `start`; returns the offset just past its CRC.
    fn walk_file(&self, bytes: &[u8], start: usize, stats: &mut WalkStats) -> Result<usize, ParseError> {
        let file = &bytes[start..];
        require(file, start, BASE_HEADER_SIZE)?;

        let header_size = file[0] as usize;
        if header_size < BASE_HEADER_SIZE {
            return Err(ParseError::InvalidHeaderSize(file[0]));
        }
        require(file, start, header_size)?;

        let hdr = header::decode(file).map_err(|_| ParseError::UnexpectedEof {
            offset: start + file.len(),
            needed: BASE_HEADER_SIZE - file.len(),
        })?;
        if !hdr.has_valid_signature() {
            return Err(ParseError::InvalidSignature(hdr.signature));
        }
        // A zero header CRC means "not computed".
        if header_size == HEADER_SIZE {
            if let Some(stored) = hdr.header_crc.filter(|&crc| crc != 0) {
                let computed = checksum(&file[..BASE_HEADER_SIZE]);
                if stored != computed {
                    return Err(ParseError::HeaderChecksumMismatch { stored, computed });
                }
            }
        }

        let data_end = header_size + hdr.data_size as usize;
        require(file, start, data_end + CRC_SIZE)?;
        if hdr.data_size == 0 {
            return Err(ParseError::EmptyPayload);
        }

        walk_records(&file[..data_end], header_size, start, stats)?;

        if self.check_crc {
            let stored = u16::from_le_bytes([file[data_end], file[data_end + 1]]);
            let computed = checksum(&file[..data_end]);
            if stored != computed {
                return Err(ParseError::ChecksumMismatch { stored, computed });
            }
        }
        Ok(start + data_end + CRC_SIZE)
    }
}

fn require(file: &[u8], start: usize, needed: usize) -> Result<(), ParseError> {
    if file.len() < needed {
        return Err(ParseError::UnexpectedEof {
            offset: start + file.len(),
            needed: needed - file.len(),
        });
    }
    Ok(())
}

/// Walk records in `data[pos..]`; `base` is the file's offset in the candidate.
fn walk_records(data: &[u8], mut pos: usize, base: usize, stats: &mut WalkStats) -> Result<(), ParseError> {
    let mut definitions: [Option<Definition>; 16] = [None; 16];
    let end = data.len();

    while pos < end {
        let record_start = pos;
        let overrun = || ParseError::RecordOverrun { offset: base + record_start, end: base + end };
        let h = data[pos];
        pos += 1;

        if h & COMPRESSED_HEADER == 0 && h & DEFINITION_HEADER != 0 {
            let local = h & LOCAL_TYPE_MASK;
            let fixed = data.get(pos..pos + DEFINITION_FIXED_SIZE).ok_or_else(overrun)?;
            let arch = fixed[1];
            let global_message = match arch {
                0 => u16::from_le_bytes([fixed[2], fixed[3]]),
                1 => u16::from_be_bytes([fixed[2], fixed[3]]),
                _ => return Err(ParseError::InvalidArchitecture { arch, offset: base + record_start }),
            };
            let field_count = fixed[4] as usize;
            pos += DEFINITION_FIXED_SIZE;

            let fields = data
                .get(pos..pos + field_count * FIELD_DEFINITION_SIZE)
                .ok_or_else(overrun)?;
            let mut message_size = 0usize;
            for field in fields.chunks_exact(FIELD_DEFINITION_SIZE) {
                let base_type = field[2];
                if base_type & BASE_TYPE_RESERVED_MASK != 0
                    || base_type & BASE_TYPE_NUMBER_MASK > MAX_BASE_TYPE_NUMBER
                {
                    return Err(ParseError::InvalidBaseType { base_type, offset: base + record_start });
                }
                message_size += field[1] as usize;
            }
            pos += fields.len();

            if h & DEV_DATA_FLAG != 0 {
                let dev_count = *data.get(pos).ok_or_else(overrun)? as usize;
                pos += 1;
                let dev_fields = data
                    .get(pos..pos + dev_count * FIELD_DEFINITION_SIZE)
                    .ok_or_else(overrun)?;
                message_size += dev_fields
                    .chunks_exact(FIELD_DEFINITION_SIZE)
                    .map(|f| f[1] as usize)
                    .sum::<usize>();
                pos += dev_fields.len();
            }

            tracing::trace!(local, global_message, message_size, "definition");
            definitions[local as usize] = Some(Definition { message_size });
            stats.definitions += 1;
        } else {
            let local = if h & COMPRESSED_HEADER != 0 {
                (h >> 5) & 0x03
            } else {
                h & LOCAL_TYPE_MASK
            };
            let def = definitions[local as usize].ok_or(ParseError::UndefinedLocalMessage {
                local,
                offset: base + record_start,
            })?;
            if end - pos < def.message_size {
                return Err(overrun());
            }
            pos += def.message_size;
            stats.data_messages += 1;
        }
    }
    Ok(())
}
