//! Frame layout, construction and parsing.
//!
//! A frame carries a fixed-size slice of a user payload between two ports:
//! - Flag: delimiter the receiver synchronises on
//! - Addresses: originating port and (always zero) destination
//! - Data: exactly `N` payload bytes
//! - FCS: checksum over the data bytes only
//!
//! # Frame Format
//!
//! ```text
//! +------------------+
//! | Flag (2 bytes)   |  '$' followed by 'a' + N
//! +------------------+
//! | source (1)       |  originating port number
//! +------------------+
//! | destination (1)  |  always 0
//! +------------------+
//! | data (N)         |  payload, truncated or zero-padded to N bytes
//! +------------------+
//! | fcs (1)          |  crc::compute_checksum(data)
//! +------------------+
//! ```
//!
//! This is the unstuffed layout. Everything after the flag goes through
//! [`crate::stuffing`] before it is placed on a byte channel.

use crate::crc::compute_checksum;
use crate::error::{ConfigError, FrameError, Result};

/// First flag byte; the receiver resynchronises on it.
pub const FLAG_PREFIX: u8 = b'$';

/// Destination address used by every frame.
pub const BROADCAST_ADDRESS: u8 = 0;

/// Largest supported data field.
pub const MAX_DATA_LEN: usize = 16;

/// Bytes in a frame besides the data field: flag (2) + addresses (2) + fcs (1).
pub const OVERHEAD: usize = 5;

/// Protocol parameters shared by both ends of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    /// Data field length `N`
    pub data_len: usize,

    /// Two-byte frame delimiter
    pub flag: [u8; 2],
}

impl FrameFormat {
    /// Build the format for an `N`-byte data field.
    ///
    /// The flag suffix is derived from `N` so links with different data
    /// lengths never accept each other's frames.
    ///
    /// # Errors
    /// `ConfigError::InvalidDataLength` unless `1 <= data_len <= 16`.
    pub fn new(data_len: usize) -> std::result::Result<Self, ConfigError> {
        if data_len == 0 || data_len > MAX_DATA_LEN {
            return Err(ConfigError::InvalidDataLength(data_len));
        }

        Ok(Self {
            data_len,
            flag: [FLAG_PREFIX, b'a' + data_len as u8],
        })
    }

    /// Flag prefix byte.
    pub fn flag_prefix(&self) -> u8 {
        self.flag[0]
    }

    /// Flag suffix byte.
    pub fn flag_suffix(&self) -> u8 {
        self.flag[1]
    }

    /// Total unstuffed frame length.
    pub fn frame_len(&self) -> usize {
        self.data_len + OVERHEAD
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            data_len: 1,
            flag: [FLAG_PREFIX, b'b'],
        }
    }
}

/// A single frame, as built by the sender or parsed by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Delimiter
    pub flag: [u8; 2],

    /// Originating port number
    pub source: u8,

    /// Destination address (always zero in this simulation)
    pub destination: u8,

    /// Exactly `FrameFormat::data_len` bytes
    pub data: Vec<u8>,

    /// Checksum carried by the frame
    pub fcs: u8,
}

impl Frame {
    /// Build a frame from a user payload.
    ///
    /// The payload is truncated or right-padded with zeros to exactly
    /// `format.data_len` bytes and the FCS is computed over the result.
    pub fn encode(payload: &[u8], source: u8, format: &FrameFormat) -> Self {
        let mut data = vec![0u8; format.data_len];
        let take = payload.len().min(format.data_len);
        data[..take].copy_from_slice(&payload[..take]);

        let fcs = compute_checksum(&data);

        Self {
            flag: format.flag,
            source,
            destination: BROADCAST_ADDRESS,
            data,
            fcs,
        }
    }

    /// Serialize to the unstuffed wire layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.data.len() + OVERHEAD);

        bytes.extend_from_slice(&self.flag);
        bytes.push(self.source);
        bytes.push(self.destination);
        bytes.extend_from_slice(&self.data);
        bytes.push(self.fcs);

        bytes
    }

    /// Parse an unstuffed frame.
    ///
    /// The FCS is carried over as-is; use [`Frame::fcs_valid`] to check it.
    ///
    /// # Errors
    /// - `FrameError::TooShort` if fewer than `format.frame_len()` bytes
    /// - `FrameError::LengthMismatch` if more than `format.frame_len()` bytes
    /// - `FrameError::InvalidFlag` if the delimiter doesn't match
    pub fn parse(bytes: &[u8], format: &FrameFormat) -> Result<Self> {
        let expected = format.frame_len();

        if bytes.len() < expected {
            return Err(FrameError::TooShort {
                required: expected,
                actual: bytes.len(),
            }
            .into());
        }

        if bytes.len() > expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: bytes.len(),
            }
            .into());
        }

        let flag = [bytes[0], bytes[1]];
        if flag != format.flag {
            return Err(FrameError::InvalidFlag {
                expected: format.flag,
                actual: flag,
            }
            .into());
        }

        let data_end = 4 + format.data_len;

        Ok(Self {
            flag,
            source: bytes[2],
            destination: bytes[3],
            data: bytes[4..data_end].to_vec(),
            fcs: bytes[data_end],
        })
    }

    /// Whether the carried FCS matches the current data.
    pub fn fcs_valid(&self) -> bool {
        compute_checksum(&self.data) == self.fcs
    }

    /// Payload bytes as printable text (trailing zero padding removed).
    pub fn data_text(&self) -> String {
        let end = self
            .data
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }
}
