//! Modbus-RTU frame codec
//!
//! Builds read-request command frames and validates fixed-length response
//! frames. Everything here is stateless and works on byte slices.
//!
//! ## Wire Format
//!
//! Command (8 bytes):
//!
//! ```text
//! address | function | reg_hi | reg_lo | count_hi | count_lo | crc_lo | crc_hi
//! ```
//!
//! Response (`frame_len` bytes, 7 for a single register):
//!
//! ```text
//! address | function | byte_count | data_msb | data_lsb | crc_lo | crc_hi
//! ```
//!
//! Multi-byte fields are big-endian except the CRC trailer, which is
//! little-endian.

use std::fmt::Write as _;

use crate::crc::{append_crc, crc16, trailing_crc};
use crate::types::DecodedSample;
use crate::{FrameError, LinkError};

/// Length of a read-request command frame.
pub const COMMAND_LEN: usize = 8;

/// Length of the CRC trailer.
pub const CRC_LEN: usize = 2;

/// Default device address, also the response start byte.
pub const DEFAULT_ADDRESS: u8 = 0x01;

/// Read Holding Registers.
pub const READ_HOLDING_REGISTERS: u8 = 0x03;

/// Register holding the current measurement on the reference sensor.
pub const DEFAULT_REGISTER: u16 = 0x0056;

/// Response length for a single-register read.
pub const DEFAULT_FRAME_LEN: usize = 7;

/// Index of the data MSB inside a response.
pub const DEFAULT_DATA_OFFSET: usize = 3;

/// Immutable 8-byte command frame with its CRC already appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame([u8; COMMAND_LEN]);

impl CommandFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Header bytes without the CRC trailer.
    pub fn header(&self) -> &[u8] {
        &self.0[..COMMAND_LEN - CRC_LEN]
    }

    pub fn crc(&self) -> u16 {
        u16::from_le_bytes([self.0[6], self.0[7]])
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Parameters of a read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub address: u8,
    pub function: u8,
    pub register: u16,
    pub count: u16,
}

impl Default for ReadRequest {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            function: READ_HOLDING_REGISTERS,
            register: DEFAULT_REGISTER,
            count: 1,
        }
    }
}

impl ReadRequest {
    pub fn encode(&self) -> CommandFrame {
        build_command(self.address, self.function, self.register, self.count)
    }
}

/// Build a command frame: 6 header bytes followed by their CRC16, low byte first.
pub fn build_command(address: u8, function: u8, register: u16, count: u16) -> CommandFrame {
    let [reg_hi, reg_lo] = register.to_be_bytes();
    let [count_hi, count_lo] = count.to_be_bytes();
    let header = [address, function, reg_hi, reg_lo, count_hi, count_lo];
    let [crc_lo, crc_hi] = crc16(&header).to_le_bytes();

    CommandFrame([address, function, reg_hi, reg_lo, count_hi, count_lo, crc_lo, crc_hi])
}

/// Shape of the expected response frame.
///
/// The device address doubles as the start byte the resynchronizer scans for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    address: u8,
    frame_len: usize,
    data_offset: usize,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            frame_len: DEFAULT_FRAME_LEN,
            data_offset: DEFAULT_DATA_OFFSET,
        }
    }
}

impl FrameLayout {
    /// Create a layout, checking that the data field sits between the
    /// address byte and the CRC trailer.
    pub fn new(address: u8, frame_len: usize, data_offset: usize) -> Result<Self, LinkError> {
        if data_offset == 0 {
            return Err(LinkError::config(
                "response layout",
                "data offset must leave room for the address byte",
            ));
        }
        let needed = data_offset.checked_add(2 + CRC_LEN);
        if needed.is_none_or(|needed| needed > frame_len) {
            return Err(LinkError::config(
                "response layout",
                format!(
                    "frame length {} too short for 2 data bytes at offset {} plus CRC",
                    frame_len, data_offset
                ),
            ));
        }
        Ok(Self { address, frame_len, data_offset })
    }

    /// Layout for a given address and length with the default data offset.
    pub fn with_len(address: u8, frame_len: usize) -> Result<Self, LinkError> {
        Self::new(address, frame_len, DEFAULT_DATA_OFFSET)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn start_byte(&self) -> u8 {
        self.address
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn data_offset(&self) -> usize {
        self.data_offset
    }
}

/// Validate one response frame and extract its measurement.
///
/// Checks run in order: length, address, CRC. The first failing check
/// decides the error.
pub fn validate_frame(bytes: &[u8], layout: &FrameLayout) -> Result<DecodedSample, FrameError> {
    if bytes.len() != layout.frame_len {
        return Err(FrameError::IncompleteFrame {
            expected: layout.frame_len,
            received: bytes.len(),
            bytes: bytes.to_vec(),
        });
    }

    let found = bytes[0];
    if found != layout.address {
        return Err(FrameError::UnexpectedAddress {
            expected: layout.address,
            found,
            bytes: bytes.to_vec(),
        });
    }

    let body = &bytes[..bytes.len() - CRC_LEN];
    let calculated = crc16(body);
    let received = trailing_crc(bytes).unwrap_or(!calculated);
    if calculated != received {
        return Err(FrameError::checksum_mismatch(calculated, received, bytes.to_vec()));
    }

    let offset = layout.data_offset;
    Ok(DecodedSample::from_be_bytes(bytes[offset], bytes[offset + 1]))
}

/// Build a well-formed response frame carrying `value`.
///
/// Bytes between the function code and the data field hold the byte count
/// first and zeros after it.
pub fn encode_response(layout: &FrameLayout, function: u8, value: u16) -> Vec<u8> {
    let body_len = layout.frame_len - CRC_LEN;
    let mut frame = vec![0u8; body_len];
    frame[0] = layout.address;
    if body_len > 1 && layout.data_offset > 1 {
        frame[1] = function;
    }
    if layout.data_offset > 2 {
        frame[2] = 2;
    }
    frame[layout.data_offset..layout.data_offset + 2].copy_from_slice(&value.to_be_bytes());
    append_crc(&mut frame);
    frame
}

/// Format bytes as space separated lowercase hex.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}
