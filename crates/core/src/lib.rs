//! dlink-sim-core: Byte-oriented data-link layer over serial port pairs
//!
//! This library provides the core components for a learning-focused link that:
//! - Builds fixed-size frames with a flag, addresses, data and a CRC-8 FCS
//! - Byte-stuffs frames so the flag never appears inside a frame body
//! - Resynchronises on the flag at the receiver, across fragmented reads
//! - Simulates CSMA/CD contention (busy sensing, collisions, jam, back-off)
//! - Injects single-bit errors to show checksum-based detection
//!
//! # Architecture
//!
//! - `crc`: CRC-8 frame check sequence
//! - `framing`: Frame layout, encode and parse
//! - `stuffing`: Escape-based byte stuffing
//! - `assembler`: Receiver frame-synchronisation state machine
//! - `random`: Injectable, seedable randomness
//! - `access`: Channel access simulator
//! - `injector`: Bit-error injector
//! - `transport`: Byte channel contract and in-memory null-modem ports
//! - `serial`: Hardware serial ports
//! - `session`: Two-pair session orchestration
//! - `metrics`: Observable session behavior
//!
//! # Design Principles
//!
//! - **No panics on data**: malformed frames and transport failures are
//!   reported and skipped
//! - **Deterministic**: every random draw comes from a seeded source
//! - **Sequential sends**: one input line at a time, pair 1 before pair 2

pub mod access;
pub mod assembler;
pub mod crc;
pub mod error;
pub mod framing;
pub mod injector;
pub mod metrics;
pub mod random;
pub mod serial;
pub mod session;
pub mod stuffing;
pub mod transport;

// Re-export commonly used types
pub use error::{Error, Result};
pub use framing::{Frame, FrameFormat};
pub use session::{CycleReport, Session, SessionConfig};
