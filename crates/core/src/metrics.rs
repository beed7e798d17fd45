//! Metrics collection and reporting for a session.
//!
//! Tracks what the link did over the lifetime of a session:
//! - Traffic (lines, frames, bytes on the wire)
//! - Contention (busy senses, collisions, write failures)
//! - Reception (frames assembled, malformed frames, FCS failures)
//! - Error injection (corruptions applied and detected)
//!
//! # Thread Safety
//!
//! `Metrics` is owned by the session's send path and updated there only;
//! receive tasks report through their frame queues instead.

use crate::access::TransmitReport;
use crate::injector::InjectionOutcome;
use std::time::{Duration, Instant};

/// Counters for one session.
#[derive(Debug, Clone)]
pub struct Metrics {
    // === Timing ===
    /// When the session started
    pub start_time: Instant,

    /// When the session ended (set on shutdown)
    pub end_time: Option<Instant>,

    // === Sending ===
    /// Non-empty input lines processed
    pub lines_processed: u64,

    /// Frames that got past carrier sense
    pub frames_sent: u64,

    /// Bytes placed on the wire across all pairs
    pub bytes_on_wire: u64,

    /// Busy carrier senses
    pub busy_waits: u64,

    /// Collisions declared
    pub collisions: u64,

    /// Failed writes
    pub write_errors: u64,

    /// Sends abandoned because the channel never became free
    pub access_failures: u64,

    // === Receiving ===
    /// Frames assembled and parsed
    pub frames_received: u64,

    /// Frames dropped as malformed
    pub frames_malformed: u64,

    /// Received frames whose carried FCS did not match their data
    pub fcs_failures: u64,

    /// Expected frames that never arrived within the receive timeout
    pub receive_timeouts: u64,

    /// Frames that turned up after their cycle ended and were discarded
    pub frames_late: u64,

    // === Error injection ===
    /// Bits flipped by the injector
    pub corruptions_injected: u64,

    /// Corruptions exposed by checksum comparison
    pub corruptions_detected: u64,
}

impl Metrics {
    /// Create new metrics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            end_time: None,
            lines_processed: 0,
            frames_sent: 0,
            bytes_on_wire: 0,
            busy_waits: 0,
            collisions: 0,
            write_errors: 0,
            access_failures: 0,
            frames_received: 0,
            frames_malformed: 0,
            fcs_failures: 0,
            receive_timeouts: 0,
            frames_late: 0,
            corruptions_injected: 0,
            corruptions_detected: 0,
        }
    }

    /// Mark the session as complete.
    pub fn complete(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Get total duration (or current elapsed if not complete).
    pub fn duration(&self) -> Duration {
        match self.end_time {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Fold one transmission into the counters.
    pub fn record_transmit(&mut self, report: &TransmitReport) {
        self.frames_sent += 1;
        self.bytes_on_wire += report.bytes_on_wire as u64;
        self.busy_waits += report.busy_waits as u64;
        self.write_errors += report.write_errors as u64;
        if report.collision {
            self.collisions += 1;
        }
    }

    /// Fold one received frame into the counters.
    pub fn record_received(&mut self, fcs_valid: bool, injection: &InjectionOutcome) {
        self.frames_received += 1;
        if !fcs_valid {
            self.fcs_failures += 1;
        }
        if injection.corrupted() {
            self.corruptions_injected += 1;
        }
        if injection.detected() {
            self.corruptions_detected += 1;
        }
    }

    /// Compute collision rate (collisions / frames sent).
    pub fn collision_rate(&self) -> f64 {
        if self.frames_sent == 0 {
            0.0
        } else {
            self.collisions as f64 / self.frames_sent as f64
        }
    }

    /// Compute detection rate (detected / injected).
    pub fn detection_rate(&self) -> f64 {
        if self.corruptions_injected == 0 {
            0.0
        } else {
            self.corruptions_detected as f64 / self.corruptions_injected as f64
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Session Summary ===");
        println!("Duration: {} ms", self.duration().as_millis());
        println!("Lines processed: {}", self.lines_processed);
        println!();

        println!("=== Sending ===");
        println!("Frames sent: {}", self.frames_sent);
        println!("Bytes on wire: {}", self.bytes_on_wire);
        println!("Busy senses: {}", self.busy_waits);
        println!("Collisions: {} ({:.2}%)", self.collisions, self.collision_rate() * 100.0);
        println!("Write errors: {}", self.write_errors);
        println!("Access failures: {}", self.access_failures);
        println!();

        println!("=== Receiving ===");
        println!("Frames received: {}", self.frames_received);
        println!("Malformed frames: {}", self.frames_malformed);
        println!("FCS failures: {}", self.fcs_failures);
        println!("Receive timeouts: {}", self.receive_timeouts);
        println!("Late frames: {}", self.frames_late);
        println!();

        println!("=== Error Injection ===");
        println!("Corruptions injected: {}", self.corruptions_injected);
        println!(
            "Corruptions detected: {} ({:.2}%)",
            self.corruptions_detected,
            self.detection_rate() * 100.0
        );
        println!();
    }

    /// Export metrics as a simple text format (for parsing/testing).
    pub fn export_text(&self) -> String {
        format!(
            "duration_ms={}\n\
             lines_processed={}\n\
             frames_sent={}\n\
             bytes_on_wire={}\n\
             busy_waits={}\n\
             collisions={}\n\
             collision_rate={:.4}\n\
             write_errors={}\n\
             access_failures={}\n\
             frames_received={}\n\
             frames_malformed={}\n\
             fcs_failures={}\n\
             receive_timeouts={}\n\
             frames_late={}\n\
             corruptions_injected={}\n\
             corruptions_detected={}\n",
            self.duration().as_millis(),
            self.lines_processed,
            self.frames_sent,
            self.bytes_on_wire,
            self.busy_waits,
            self.collisions,
            self.collision_rate(),
            self.write_errors,
            self.access_failures,
            self.frames_received,
            self.frames_malformed,
            self.fcs_failures,
            self.receive_timeouts,
            self.frames_late,
            self.corruptions_injected,
            self.corruptions_detected,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::BitFlip;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert!(metrics.end_time.is_none());
        assert!(metrics.duration().as_millis() < 100);
    }

    #[test]
    fn test_record_transmit() {
        let mut metrics = Metrics::new();
        let report = TransmitReport {
            busy_waits: 2,
            collision: true,
            attempts: 2,
            writes_ok: 2,
            write_errors: 0,
            bytes_on_wire: 12,
            waited: Duration::from_millis(30),
        };

        metrics.record_transmit(&report);
        metrics.record_transmit(&TransmitReport {
            attempts: 1,
            writes_ok: 1,
            bytes_on_wire: 6,
            ..Default::default()
        });

        assert_eq!(metrics.frames_sent, 2);
        assert_eq!(metrics.bytes_on_wire, 18);
        assert_eq!(metrics.busy_waits, 2);
        assert_eq!(metrics.collisions, 1);
        assert_eq!(metrics.collision_rate(), 0.5);
    }

    #[test]
    fn test_record_received() {
        let mut metrics = Metrics::new();

        let clean = InjectionOutcome {
            flip: None,
            original_fcs: 0x4E,
            current_fcs: 0x4E,
        };
        let hit = InjectionOutcome {
            flip: Some(BitFlip { byte_index: 0, bit: 0 }),
            original_fcs: 0x4E,
            current_fcs: 0x49,
        };

        metrics.record_received(true, &clean);
        metrics.record_received(false, &hit);

        assert_eq!(metrics.frames_received, 2);
        assert_eq!(metrics.fcs_failures, 1);
        assert_eq!(metrics.corruptions_injected, 1);
        assert_eq!(metrics.corruptions_detected, 1);
        assert_eq!(metrics.detection_rate(), 1.0);
    }

    #[test]
    fn test_export_text() {
        let mut metrics = Metrics::new();
        metrics.lines_processed = 3;
        metrics.frames_sent = 6;
        metrics.collisions = 2;

        let text = metrics.export_text();
        assert!(text.contains("lines_processed=3"));
        assert!(text.contains("frames_sent=6"));
        assert!(text.contains("collisions=2"));
    }

    #[test]
    fn test_complete_freezes_duration() {
        let mut metrics = Metrics::new();
        metrics.complete();
        let first = metrics.duration();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(metrics.duration(), first);
    }
}
