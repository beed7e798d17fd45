//! Demo payload generation.
//!
//! With `--demo N` the application sends N generated lines instead of reading
//! the console. Lines are chosen to exercise the link: plain text, lines that
//! start with reserved bytes (flag prefix, escape byte) so stuffing kicks in,
//! and the occasional empty line, which the session skips.
//!
//! # Design
//!
//! Generated lines are:
//! - 50% lowercase words
//! - 30% led by a reserved byte (`$`, `}` or the flag suffix)
//! - 10% digits
//! - 10% empty

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Generate `count` demo lines, reproducible from `seed`.
///
/// `flag_suffix` is the second flag byte of the active frame format, so
/// reserved-byte lines hit every escape case.
pub fn generate_demo_lines(seed: u64, count: usize, flag_suffix: u8) -> Vec<String> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let reserved = [b'$', b'}', flag_suffix];

    (0..count)
        .map(|_| {
            let kind: u8 = rng.gen_range(0..10);
            let len = rng.gen_range(1..=8);

            match kind {
                0..=4 => random_word(&mut rng, b"abcdefghijklmnopqrstuvwxyz", len),
                5..=7 => {
                    let lead = reserved[rng.gen_range(0..reserved.len())] as char;
                    let mut line = String::with_capacity(len + 1);
                    line.push(lead);
                    line.push_str(&random_word(&mut rng, b"abcdefghijklmnopqrstuvwxyz$}", len));
                    line
                }
                8 => random_word(&mut rng, b"0123456789", len),
                _ => String::new(),
            }
        })
        .collect()
}

fn random_word(rng: &mut ChaCha8Rng, alphabet: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}
