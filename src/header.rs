//! FIT file header codec.
//!
//! # Layout (little-endian)
//!
//! | Offset | Size | Field              |
//! |--------|------|--------------------|
//! | 0      | 1    | `header_size`      |
//! | 1      | 1    | `protocol_version` |
//! | 2      | 2    | `profile_version`  |
//! | 4      | 4    | `data_size`        |
//! | 8      | 4    | `.FIT` signature   |
//! | 12     | 2    | header CRC (only when `header_size == 14`) |
//!
//! `data_size` counts payload bytes only: no header, no trailing CRC.  In a
//! damaged file it is the one field that cannot be trusted, so [`encode`]
//! always takes the corrected value from the caller.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;

pub const SIGNATURE: &[u8; 4] = b".FIT";
/// Header without the optional CRC field.
pub const BASE_HEADER_SIZE: usize = 12;
/// Header with the CRC field; every repaired file uses this size.
pub const HEADER_SIZE: usize = 14;

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("Input is {len} bytes, shorter than the {BASE_HEADER_SIZE}-byte FIT header")]
    TruncatedInput { len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub header_size:      u8,
    pub protocol_version: u8,
    pub profile_version:  u16,
    /// Declared payload length.  Untrusted in a damaged file.
    pub data_size:        u32,
    /// Signature bytes as found in the source.  Never written back.
    pub signature:        [u8; 4],
    /// Stored header CRC, when the header declares 14 bytes and they exist.
    pub header_crc:       Option<u16>,
}

impl FileHeader {
    pub fn has_valid_signature(&self) -> bool {
        &self.signature == SIGNATURE
    }

    /// Serialise with `data_size` replaced by `data_size`.
    pub fn write<W: Write>(&self, mut writer: W, data_size: u32) -> io::Result<()> {
        writer.write_u8(self.header_size)?;
        writer.write_u8(self.protocol_version)?;
        writer.write_u16::<LittleEndian>(self.profile_version)?;
        writer.write_u32::<LittleEndian>(data_size)?;
        writer.write_all(SIGNATURE)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let header_size = reader.read_u8()?;
        let protocol_version = reader.read_u8()?;
        let profile_version = reader.read_u16::<LittleEndian>()?;
        let data_size = reader.read_u32::<LittleEndian>()?;
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature)?;
        Ok(Self {
            header_size,
            protocol_version,
            profile_version,
            data_size,
            signature,
            header_crc: None,
        })
    }
}

/// Decode the header from the start of `bytes`.
pub fn decode(bytes: &[u8]) -> Result<FileHeader, HeaderError> {
    if bytes.len() < BASE_HEADER_SIZE {
        return Err(HeaderError::TruncatedInput { len: bytes.len() });
    }
    let mut cursor = Cursor::new(bytes);
    let mut header = FileHeader::read(&mut cursor)
        .map_err(|_| HeaderError::TruncatedInput { len: bytes.len() })?;
    if header.header_size as usize == HEADER_SIZE {
        header.header_crc = cursor.read_u16::<LittleEndian>().ok();
    }
    Ok(header)
}

/// Encode the first 12 header bytes with a corrected `data_size`.
pub fn encode(header: &FileHeader, data_size: u32) -> [u8; BASE_HEADER_SIZE] {
    let mut out = [0u8; BASE_HEADER_SIZE];
    // A 12-byte slice always has room for the 12-byte header.
    let _ = header.write(&mut out[..], data_size);
    out
}
