//! Error types for the dlink-sim system.
//!
//! All operations return structured errors rather than panicking.
//! Transport and malformed-frame errors are recovered by the caller (logged,
//! loop continues); configuration errors abort startup.

use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Frame: a received frame that cannot be parsed
/// - Access: the simulated medium could not be acquired
/// - Config: invalid port, line or simulation settings
/// - I/O: the underlying byte channel failed
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed frame on the receive path
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Channel access failed (e.g. busy-sensing gave up)
    #[error("channel access error: {0}")]
    Access(#[from] AccessError),

    /// Configuration error, fatal at session start
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Byte channel I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Receive task queue closed unexpectedly
    #[error("channel error: {0}")]
    Channel(String),
}

/// Malformed-frame errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Frame is shorter than the fixed layout
    #[error("frame too short: need at least {required} bytes, got {actual}")]
    TooShort { required: usize, actual: usize },

    /// Frame is longer than the fixed layout
    #[error("frame length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Frame does not start with the configured flag
    #[error("invalid flag: expected {expected:02x?}, got {actual:02x?}")]
    InvalidFlag { expected: [u8; 2], actual: [u8; 2] },
}

/// Channel access errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// Busy sensing never saw a free channel
    #[error("channel still busy after {attempts} sense attempts")]
    ChannelBusy { attempts: u32 },
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A probability outside [0.0, 1.0]
    #[error("{name} must be within [0.0, 1.0], got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    /// Data field length outside the supported range
    #[error("data length {0} out of range 1..=16")]
    InvalidDataLength(usize),

    /// Baud rate of zero
    #[error("baud rate must be positive")]
    InvalidBaud,

    /// Unknown parity name
    #[error("unknown parity {0:?} (expected None, Even or Odd)")]
    InvalidParity(String),

    /// Busy-sensing bound of zero
    #[error("max sense attempts must be at least 1")]
    InvalidSenseBound,

    /// Virtual pair count outside what port numbers and addresses allow
    #[error("virtual pair count {0} out of range 1..={max}", max = crate::transport::MAX_VIRTUAL_PAIRS)]
    InvalidPairCount(usize),

    /// Not enough port pairs discovered
    #[error("need at least {required} port pairs, found {found}")]
    NotEnoughPairs { required: usize, found: usize },

    /// A pair choice outside the discovered list
    #[error("pair choice {choice} out of range 1..={available}")]
    PairOutOfRange { choice: usize, available: usize },

    /// Both channel pairs selected the same ports
    #[error("both channel pairs selected pair {0}")]
    DuplicatePair(usize),
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
