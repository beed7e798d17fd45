//! Synthetic bit-error injection.
//!
//! After a frame has come back through the receive path, the injector may
//! flip a single data bit and then compares the checksum of the original
//! data with the checksum of the (possibly corrupted) data. The comparison,
//! not the corruption draw, decides whether the corruption counts as
//! detected.

use crate::access::check_probability;
use crate::crc::compute_checksum;
use crate::error::ConfigError;
use crate::random::RandomSource;

/// Configuration for error injection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectorConfig {
    /// Probability of flipping one bit per received frame [0.0, 1.0]
    pub corruption_probability: f64,
}

impl InjectorConfig {
    /// Never corrupt.
    pub fn disabled() -> Self {
        Self {
            corruption_probability: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("corruption probability", self.corruption_probability)
    }
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            corruption_probability: 0.3,
        }
    }
}

/// Location of a flipped bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitFlip {
    /// Index into the data field
    pub byte_index: usize,

    /// Bit position, 0 = least significant
    pub bit: u8,
}

/// Result of one injection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionOutcome {
    /// The bit that was flipped, if any
    pub flip: Option<BitFlip>,

    /// Checksum of the data before injection
    pub original_fcs: u8,

    /// Checksum of the data after injection
    pub current_fcs: u8,
}

impl InjectionOutcome {
    /// Whether the checksum comparison exposes a change.
    pub fn detected(&self) -> bool {
        self.original_fcs != self.current_fcs
    }

    /// Whether a bit was flipped this pass.
    pub fn corrupted(&self) -> bool {
        self.flip.is_some()
    }
}

/// Error injector for one channel pair.
pub struct ErrorInjector<R: RandomSource> {
    config: InjectorConfig,
    rng: R,

    // Statistics
    frames_seen: u64,
    corruptions: u64,
    detections: u64,
}

impl<R: RandomSource> ErrorInjector<R> {
    pub fn new(config: InjectorConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            frames_seen: 0,
            corruptions: 0,
            detections: 0,
        }
    }

    /// Possibly flip one bit of `data` in place.
    ///
    /// Byte and bit indices are reduced modulo the real data length and 8, so
    /// any random source is safe. Empty data is never corrupted.
    pub fn inject(&mut self, data: &mut [u8]) -> InjectionOutcome {
        self.frames_seen += 1;
        let original_fcs = compute_checksum(data);

        let mut flip = None;
        if !data.is_empty() && self.rng.uniform() < self.config.corruption_probability {
            let byte_index = self.rng.int_range(data.len()) % data.len();
            let bit = (self.rng.int_range(8) % 8) as u8;

            data[byte_index] ^= 1 << bit;
            flip = Some(BitFlip { byte_index, bit });
            self.corruptions += 1;

            log::debug!("flipped bit {} of data byte {}", bit, byte_index);
        }

        let outcome = InjectionOutcome {
            flip,
            original_fcs,
            current_fcs: compute_checksum(data),
        };

        if outcome.detected() {
            self.detections += 1;
        }

        outcome
    }

    /// Get statistics about injector behavior.
    pub fn stats(&self) -> InjectorStats {
        InjectorStats {
            frames_seen: self.frames_seen,
            corruptions: self.corruptions,
            detections: self.detections,
        }
    }
}

/// Statistics about injector behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectorStats {
    pub frames_seen: u64,
    pub corruptions: u64,
    pub detections: u64,
}
