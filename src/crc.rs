//! FIT file checksum.
//!
//! The FIT protocol seals every file with a 16-bit CRC over the header and
//! payload, stored little-endian after the last record.  The algorithm walks
//! each byte one nibble at a time (low nibble first) through a 16-entry
//! table.  The table below is the one published in the FIT protocol
//! document; any other CRC-16 table produces files that look complete but
//! fail checksum verification in every FIT reader.
//!
//! Two entry points:
//! - [`checksum`] for a contiguous buffer.
//! - [`Crc`] for incremental sealing (`new` / `update` / `finalize`).

/// Nibble lookup table published in the FIT protocol document.
pub const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401,
    0xA001, 0x6C00, 0x7800, 0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

/// Byte length of the checksum trailer that closes every FIT file.
pub const CRC_SIZE: usize = 2;

/// Fold one byte into a running checksum.
#[inline]
pub fn update_byte(mut crc: u16, byte: u8) -> u16 {
    // low nibble
    let mut tmp = CRC_TABLE[(crc & 0xF) as usize];
    crc = (crc >> 4) & 0x0FFF;
    crc ^= tmp ^ CRC_TABLE[(byte & 0xF) as usize];

    // high nibble
    tmp = CRC_TABLE[(crc & 0xF) as usize];
    crc = (crc >> 4) & 0x0FFF;
    crc ^= tmp ^ CRC_TABLE[((byte >> 4) & 0xF) as usize];

    crc
}

/// Checksum of `bytes` starting from the FIT initial value (0).
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |crc, &b| update_byte(crc, b))
}

/// Incremental FIT checksum.
///
/// ```
/// use fitmend::crc::{checksum, Crc};
///
/// let mut crc = Crc::new();
/// crc.update(b"1234");
/// crc.update(b"56789");
/// assert_eq!(crc.finalize(), checksum(b"123456789"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc {
    value: u16,
}

impl Crc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.value = bytes.iter().fold(self.value, |crc, &b| update_byte(crc, b));
    }

    pub fn finalize(self) -> u16 {
        self.value
    }
}
