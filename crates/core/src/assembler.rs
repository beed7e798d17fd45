//! Receiver-side frame synchronisation.
//!
//! The assembler scans an incoming byte stream for the flag prefix and cuts
//! it into stuffed frames. It carries partial state across calls, so a frame
//! split over any number of transport reads comes out exactly as if it had
//! arrived in one read.
//!
//! # States
//!
//! - **Idle**: outside any frame; bytes other than the flag prefix are dropped
//! - **InFrame**: accumulating since the last flag prefix
//!
//! A flag prefix seen while in a frame closes the current accumulation (even
//! if short) and starts a new one. A frame also closes once it holds
//! `FrameFormat::frame_len()` logical bytes, where an escape byte and the
//! byte it protects count as one.
//!
//! Emitted frames are still stuffed; the caller destuffs and validates them.

use crate::framing::FrameFormat;
use crate::stuffing::ESCAPE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Idle,
    InFrame,
}

/// Frame synchroniser for a single receive channel.
///
/// # Thread Safety
/// Not shared: each receive task owns its own instance.
#[derive(Debug)]
pub struct FrameAssembler {
    format: FrameFormat,
    state: SyncState,

    /// Stuffed bytes since the last flag prefix
    buffer: Vec<u8>,

    /// Unstuffed length of `buffer`
    logical_len: usize,

    /// Last byte in `buffer` was an escape
    escape_pending: bool,

    // Statistics
    frames_completed: u64,
    bytes_discarded: u64,
}

impl FrameAssembler {
    /// Create an assembler for frames of the given format.
    pub fn new(format: FrameFormat) -> Self {
        Self {
            format,
            state: SyncState::Idle,
            buffer: Vec::with_capacity(format.frame_len() * 2),
            logical_len: 0,
            escape_pending: false,
            frames_completed: 0,
            bytes_discarded: 0,
        }
    }

    /// Feed a chunk of received bytes.
    ///
    /// # Returns
    /// Every stuffed frame completed by this chunk, in arrival order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();

        for &byte in bytes {
            if byte == self.format.flag_prefix() {
                if self.state == SyncState::InFrame {
                    frames.push(self.take());
                }
                self.begin(byte);
                continue;
            }

            match self.state {
                SyncState::Idle => {
                    self.bytes_discarded += 1;
                }
                SyncState::InFrame => {
                    self.buffer.push(byte);

                    if self.escape_pending {
                        self.escape_pending = false;
                        self.logical_len += 1;
                    } else if byte == ESCAPE {
                        self.escape_pending = true;
                    } else {
                        self.logical_len += 1;
                    }

                    if self.logical_len >= self.format.frame_len() && !self.escape_pending {
                        frames.push(self.take());
                        self.state = SyncState::Idle;
                    }
                }
            }
        }

        frames
    }

    /// Hand out a partially accumulated frame, if any, and return to idle.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.state == SyncState::Idle {
            return None;
        }
        self.state = SyncState::Idle;
        Some(self.take())
    }

    /// Whether a frame is currently being accumulated.
    pub fn in_frame(&self) -> bool {
        self.state == SyncState::InFrame
    }

    /// Get statistics about assembler behavior.
    pub fn stats(&self) -> AssemblerStats {
        AssemblerStats {
            frames_completed: self.frames_completed,
            bytes_discarded: self.bytes_discarded,
            pending_bytes: self.buffer.len(),
        }
    }

    fn begin(&mut self, prefix: u8) {
        self.state = SyncState::InFrame;
        self.buffer.clear();
        self.buffer.push(prefix);
        self.logical_len = 1;
        self.escape_pending = false;
    }

    fn take(&mut self) -> Vec<u8> {
        self.frames_completed += 1;
        self.logical_len = 0;
        self.escape_pending = false;
        std::mem::take(&mut self.buffer)
    }
}

/// Statistics about assembler behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerStats {
    /// Frames handed to the caller (complete or cut short)
    pub frames_completed: u64,

    /// Bytes dropped while idle
    pub bytes_discarded: u64,

    /// Bytes in the current partial frame
    pub pending_bytes: usize,
}
