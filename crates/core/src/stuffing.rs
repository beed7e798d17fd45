//! Escape-based byte stuffing.
//!
//! The flag is written raw; every byte after it is checked against the
//! reserved set (flag prefix, flag suffix, escape byte). A reserved byte `b`
//! is replaced by `ESCAPE, b ^ ESCAPE_MASK`, so the flag prefix can never
//! appear inside a well-formed stuffed body and the receiver cannot
//! resynchronise mid-frame.
//!
//! A corrupted escape byte defeats this guarantee; nothing beyond the data
//! FCS protects against it.
//!
//! # Dangling escape
//! If the input to [`destuff`] ends with an escape byte that has no
//! successor, the incomplete escape is dropped.

use crate::framing::{Frame, FrameFormat};

/// Escape byte.
pub const ESCAPE: u8 = 0x7D;

/// Mask applied to an escaped byte.
pub const ESCAPE_MASK: u8 = 0x20;

/// Stuff a complete frame for the wire.
pub fn stuff_frame(frame: &Frame, format: &FrameFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(format.frame_len() * 2);
    out.extend_from_slice(&frame.flag);

    push_stuffed(&mut out, frame.source, format);
    push_stuffed(&mut out, frame.destination, format);
    for &byte in &frame.data {
        push_stuffed(&mut out, byte, format);
    }
    push_stuffed(&mut out, frame.fcs, format);

    out
}

/// Apply the escape rule to an arbitrary body.
pub fn stuff_body(bytes: &[u8], format: &FrameFormat) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        push_stuffed(&mut out, byte, format);
    }
    out
}

/// Reverse the escape rule.
///
/// Bytes that are not the escape byte pass through unchanged, which includes
/// the raw flag at the start of a stuffed frame.
pub fn destuff(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter();

    while let Some(&byte) = iter.next() {
        if byte == ESCAPE {
            match iter.next() {
                Some(&escaped) => out.push(escaped ^ ESCAPE_MASK),
                None => break,
            }
        } else {
            out.push(byte);
        }
    }

    out
}

/// Whether `byte` must be escaped inside a frame body.
pub fn is_reserved(byte: u8, format: &FrameFormat) -> bool {
    byte == format.flag_prefix() || byte == format.flag_suffix() || byte == ESCAPE
}

fn push_stuffed(out: &mut Vec<u8>, byte: u8, format: &FrameFormat) {
    if is_reserved(byte, format) {
        out.push(ESCAPE);
        out.push(byte ^ ESCAPE_MASK);
    } else {
        out.push(byte);
    }
}
