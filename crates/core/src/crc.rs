//! CRC-8 frame check sequence.
//!
//! Generator 0x07, register initialised to zero, data fed MSB first, no
//! reflection and no final XOR. This is the catalogue's CRC-8/SMBUS, so the
//! table-driven implementation from the `crc` crate is used directly.
//!
//! # Example
//! ```
//! use dlink_sim_core::crc::compute_checksum;
//!
//! assert_eq!(compute_checksum(b"123456789"), 0xF4);
//! assert_eq!(compute_checksum(&[]), 0x00);
//! ```

use crc::{Crc, CRC_8_SMBUS};

/// Generator polynomial x^8 + x^2 + x + 1 (top bit implicit).
pub const GENERATOR: u8 = 0x07;

const FCS: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Compute the checksum of `data`.
pub fn compute_checksum(data: &[u8]) -> u8 {
    FCS.checksum(data)
}
