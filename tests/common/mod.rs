//! Synthetic FIT activity files for integration tests.

#![allow(dead_code)]

use fitmend::crc::checksum;

pub const PROTOCOL_VERSION: u8 = 0x20;
pub const PROFILE_VERSION: u16 = 2132;

const BASE_ENUM:    u8 = 0x00;
const BASE_UINT8:   u8 = 0x02;
const BASE_SINT32:  u8 = 0x85;
const BASE_UINT16:  u8 = 0x84;
const BASE_UINT32:  u8 = 0x86;
const BASE_UINT32Z: u8 = 0x8C;
const BASE_BYTE:    u8 = 0x0D;

fn definition(local: u8, global: u16, fields: &[(u8, u8, u8)]) -> Vec<u8> {
    let mut d = vec![0x40 | local, 0x00, 0x00];
    d.extend_from_slice(&global.to_le_bytes());
    d.push(fields.len() as u8);
    for &(num, size, base) in fields {
        d.extend_from_slice(&[num, size, base]);
    }
    d
}

fn file_id(serial: u32) -> Vec<u8> {
    let mut p = definition(0, 0, &[
        (0, 1, BASE_ENUM),
        (1, 2, BASE_UINT16),
        (2, 2, BASE_UINT16),
        (3, 4, BASE_UINT32Z),
        (4, 4, BASE_UINT32),
    ]);
    p.push(0x00);
    p.push(4); // activity
    p.extend_from_slice(&1u16.to_le_bytes());
    p.extend_from_slice(&3113u16.to_le_bytes());
    p.extend_from_slice(&serial.to_le_bytes());
    p.extend_from_slice(&1_000_000_000u32.to_le_bytes());
    p
}

const RECORD_FIELDS: &[(u8, u8, u8)] = &[
    (253, 4, BASE_UINT32),
    (0, 4, BASE_SINT32),
    (1, 4, BASE_SINT32),
    (3, 1, BASE_UINT8),
    (4, 1, BASE_UINT8),
    (6, 2, BASE_UINT16),
];
/// Header byte plus field bytes.
const RECORD_SIZE: usize = 1 + 16;

fn record(i: u32) -> Vec<u8> {
    let mut r = vec![0x01];
    r.extend_from_slice(&(1_000_000_000 + i).to_le_bytes());
    r.extend_from_slice(&(523_000_000i32 + i as i32 * 37).to_le_bytes());
    r.extend_from_slice(&(-1_000_000i32 - i as i32 * 11).to_le_bytes());
    r.push(120 + (i % 40) as u8);
    r.push(85 + (i % 7) as u8);
    r.extend_from_slice(&(3200 + (i % 300) as u16).to_le_bytes());
    r
}

/// Payload with `records` record messages.
pub fn payload(records: usize, serial: u32) -> Vec<u8> {
    let mut p = file_id(serial);
    p.extend(definition(1, 20, RECORD_FIELDS));
    for i in 0..records {
        p.extend(record(i as u32));
    }
    p
}

/// Payload of exactly `size` bytes: records, then one byte-array message
/// (local 2) absorbing the remainder.
pub fn payload_of_size(size: usize, serial: u32) -> Vec<u8> {
    let fixed = payload(0, serial).len();
    let filler_def = definition(2, 0xFF00, &[(0, 1, BASE_BYTE)]).len();
    let records = (size - fixed - filler_def - 2) / RECORD_SIZE;
    let mut p = payload(records, serial);
    let filler = size - p.len() - filler_def - 1;
    assert!((1..=255).contains(&filler));
    p.extend(definition(2, 0xFF00, &[(0, filler as u8, BASE_BYTE)]));
    p.push(0x02);
    p.extend(std::iter::repeat(0xAB).take(filler));
    assert_eq!(p.len(), size);
    p
}

/// Wrap `payload` in a 14-byte header (header CRC 0) and seal it.
pub fn seal(payload: &[u8]) -> Vec<u8> {
    let mut b = vec![14u8, PROTOCOL_VERSION];
    b.extend_from_slice(&PROFILE_VERSION.to_le_bytes());
    b.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    b.extend_from_slice(b".FIT");
    b.extend_from_slice(&[0, 0]);
    b.extend_from_slice(payload);
    let crc = checksum(&b);
    b.extend_from_slice(&crc.to_le_bytes());
    b
}

/// True when `b`, read as a record header, names a local type the fixtures
/// never define, so parsing stops right there.
pub fn is_dead_header(b: u8) -> bool {
    if b & 0x80 != 0 {
        (b >> 5) & 0x03 == 3
    } else if b & 0x40 != 0 {
        false
    } else {
        b & 0x0F > 2
    }
}

/// A valid file of exactly `total` bytes whose trailing CRC's first byte is a
/// dead record header.  Appending garbage to it can never produce an early
/// false positive: every too-long candidate stops at that byte.
pub fn valid_file(total: usize) -> Vec<u8> {
    (0u32..)
        .map(|serial| seal(&payload_of_size(total - 16, serial)))
        .find(|f| is_dead_header(f[f.len() - 2]))
        .expect("some serial yields a dead CRC byte")
}

/// Deterministic garbage, the kind a torn write leaves.
pub fn garbage(k: usize) -> Vec<u8> {
    (0..k).map(|i| (i as u8).wrapping_mul(0x9D).wrapping_add(0x31)).collect()
}
