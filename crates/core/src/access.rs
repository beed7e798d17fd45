//! CSMA/CD-style channel access simulation.
//!
//! Collisions are not detected on real hardware; they are drawn from the
//! injected [`RandomSource`] so behaviour is reproducible from a seed.
//!
//! # Send Sequence
//!
//! 1. **Carrier sense**: while a draw falls below `busy_probability`, wait a
//!    random short delay and sense again (bounded by `max_sense_attempts`)
//! 2. **Transmit**: write the stuffed frame once
//! 3. **Collision**: if a draw falls below `collision_probability`, signal a
//!    jam, hold for `jam_ms`, wait a random back-off of up to
//!    `backoff_max_ms`, and write the frame exactly once more
//!
//! There is no exponential back-off and no second collision draw on the
//! retry. Every successful write adds its size to the pair's [`ByteCounter`];
//! a failed write is logged and not counted.

use crate::error::{AccessError, ConfigError, Result};
use crate::random::RandomSource;
use crate::transport::ByteChannel;
use std::sync::Mutex;
use std::time::Duration;

/// Configuration for channel access simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessConfig {
    /// Probability that a carrier-sense draw finds the channel busy [0.0, 1.0]
    pub busy_probability: f64,

    /// Probability that a transmission collides [0.0, 1.0]
    pub collision_probability: f64,

    /// Upper bound of the random wait between busy senses
    pub busy_wait_max_ms: u64,

    /// Fixed hold after a jam signal
    pub jam_ms: u64,

    /// Upper bound of the random back-off before the retry
    pub backoff_max_ms: u64,

    /// Carrier-sense attempts before giving up
    pub max_sense_attempts: u32,
}

impl AccessConfig {
    /// An uncontended medium: never busy, never collides, no delays.
    pub fn ideal() -> Self {
        Self {
            busy_probability: 0.0,
            collision_probability: 0.0,
            busy_wait_max_ms: 0,
            jam_ms: 0,
            backoff_max_ms: 0,
            max_sense_attempts: 1,
        }
    }

    /// Check probabilities and bounds.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        check_probability("busy probability", self.busy_probability)?;
        check_probability("collision probability", self.collision_probability)?;
        if self.max_sense_attempts == 0 {
            return Err(ConfigError::InvalidSenseBound);
        }
        Ok(())
    }
}

impl Default for AccessConfig {
    /// Moderate contention with classroom-visible delays.
    fn default() -> Self {
        Self {
            busy_probability: 0.3,
            collision_probability: 0.3,
            busy_wait_max_ms: 50,
            jam_ms: 20,
            backoff_max_ms: 100,
            max_sense_attempts: 1000,
        }
    }
}

pub(crate) fn check_probability(name: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbability { name, value })
    }
}

/// Cumulative bytes placed on the wire by one channel pair.
///
/// Increments and reads go through a lock so a status line always sees a
/// consistent total.
#[derive(Debug, Default)]
pub struct ByteCounter {
    total: Mutex<u64>,
}

impl ByteCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `bytes` and return the new total.
    pub fn add(&self, bytes: usize) -> u64 {
        let mut total = self.total.lock().unwrap_or_else(|e| e.into_inner());
        *total += bytes as u64;
        *total
    }

    /// Current total.
    pub fn total(&self) -> u64 {
        *self.total.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// What happened during one call to [`ChannelAccess::transmit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmitReport {
    /// Carrier senses that found the channel busy
    pub busy_waits: u32,

    /// A collision was declared and a jam signalled
    pub collision: bool,

    /// Write attempts (1, or 2 after a collision)
    pub attempts: u32,

    /// Writes that succeeded
    pub writes_ok: u32,

    /// Writes that failed
    pub write_errors: u32,

    /// Bytes added to the pair's counter by this call
    pub bytes_on_wire: usize,

    /// Total delay requested (busy waits, jam hold and back-off)
    pub waited: Duration,
}

/// Channel access simulator for one channel pair.
pub struct ChannelAccess<R: RandomSource> {
    config: AccessConfig,
    rng: R,

    // Statistics
    transmissions: u64,
    collisions: u64,
    busy_waits: u64,
}

impl<R: RandomSource> ChannelAccess<R> {
    pub fn new(config: AccessConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            transmissions: 0,
            collisions: 0,
            busy_waits: 0,
        }
    }

    /// Send one stuffed frame on `channel`.
    ///
    /// # Errors
    /// `AccessError::ChannelBusy` if every carrier sense found the channel busy.
    /// Write failures are not errors; they are logged and counted in the report.
    pub fn transmit(
        &mut self,
        channel: &mut dyn ByteChannel,
        wire: &[u8],
        counter: &ByteCounter,
    ) -> Result<TransmitReport> {
        let mut report = TransmitReport::default();

        self.sense_carrier(&mut report)?;
        self.transmissions += 1;

        self.attempt(channel, wire, counter, &mut report);

        if self.rng.uniform() < self.config.collision_probability {
            report.collision = true;
            self.collisions += 1;
            log::info!("collision detected, sending jam signal");

            self.pause(Duration::from_millis(self.config.jam_ms), &mut report);

            let backoff = self.random_delay(self.config.backoff_max_ms);
            log::debug!("backing off for {:?} before retry", backoff);
            self.pause(backoff, &mut report);

            self.attempt(channel, wire, counter, &mut report);
        }

        Ok(report)
    }

    /// Get statistics about access behavior.
    pub fn stats(&self) -> AccessStats {
        AccessStats {
            transmissions: self.transmissions,
            collisions: self.collisions,
            busy_waits: self.busy_waits,
        }
    }

    fn sense_carrier(&mut self, report: &mut TransmitReport) -> Result<()> {
        for _ in 0..self.config.max_sense_attempts {
            if self.rng.uniform() >= self.config.busy_probability {
                return Ok(());
            }

            report.busy_waits += 1;
            self.busy_waits += 1;

            let wait = self.random_delay(self.config.busy_wait_max_ms);
            log::debug!("channel busy, sensing again in {:?}", wait);
            self.pause(wait, report);
        }

        Err(AccessError::ChannelBusy {
            attempts: self.config.max_sense_attempts,
        }
        .into())
    }

    fn attempt(
        &mut self,
        channel: &mut dyn ByteChannel,
        wire: &[u8],
        counter: &ByteCounter,
        report: &mut TransmitReport,
    ) {
        report.attempts += 1;

        match channel.write(wire) {
            Ok(written) => {
                report.writes_ok += 1;
                report.bytes_on_wire += written;
                counter.add(written);
            }
            Err(e) => {
                report.write_errors += 1;
                log::warn!("write failed: {}", e);
            }
        }
    }

    /// Uniform delay in `[0, max_ms]` milliseconds.
    fn random_delay(&mut self, max_ms: u64) -> Duration {
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let ms = self.rng.int_range(max_ms as usize + 1) as u64;
        Duration::from_millis(ms)
    }

    fn pause(&self, duration: Duration, report: &mut TransmitReport) {
        report.waited += duration;
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Statistics about channel access behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessStats {
    /// Frames that got past carrier sense
    pub transmissions: u64,

    /// Collisions declared
    pub collisions: u64,

    /// Busy carrier senses
    pub busy_waits: u64,
}

impl AccessStats {
    /// Compute collision rate (collisions / transmissions).
    pub fn collision_rate(&self) -> f64 {
        if self.transmissions == 0 {
            0.0
        } else {
            self.collisions as f64 / self.transmissions as f64
        }
    }
}
