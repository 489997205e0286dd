//! Modbus-RTU CRC16
//!
//! Reflected polynomial `0xA001`, initial value `0xFFFF`, no final XOR.
//! The checksum travels on the wire little-endian (low byte first).

/// Initial accumulator value.
pub const CRC16_INIT: u16 = 0xFFFF;

/// Bit-reflected form of the 0x8005 generator polynomial.
pub const CRC16_POLY: u16 = 0xA001;

/// Compute the Modbus-RTU CRC16 of `bytes`.
///
/// Accepts any input, including an empty slice (which yields `0xFFFF`).
pub fn crc16(bytes: &[u8]) -> u16 {
    let mut crc = CRC16_INIT;

    for &byte in bytes {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC16_POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

/// Append the CRC16 of `frame` to itself, low byte first.
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

/// Read the little-endian CRC trailer of a frame.
///
/// Returns `None` for frames shorter than the two trailer bytes.
pub fn trailing_crc(frame: &[u8]) -> Option<u16> {
    match frame {
        [.., lo, hi] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}
