//! Injectable randomness.
//!
//! Every random decision in the simulation (busy sensing, collisions,
//! back-off, bit errors) goes through [`RandomSource`], so a run is fully
//! determined by its seed and tests can script exact draws.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;

/// Source of the two kinds of draws the simulation needs.
pub trait RandomSource: Send {
    /// Uniform value in `[0.0, 1.0)`.
    fn uniform(&mut self) -> f64;

    /// Uniform integer in `[0, n)`; returns 0 when `n == 0`.
    fn int_range(&mut self, n: usize) -> usize;
}

/// Seeded ChaCha8 generator. Given the same seed, draws are bit-identical.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Derive an independent stream, e.g. one per channel pair.
    pub fn fork(&mut self) -> Self {
        Self::new(self.rng.gen())
    }
}

impl RandomSource for SeededRandom {
    fn uniform(&mut self) -> f64 {
        self.rng.gen()
    }

    fn int_range(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.rng.gen_range(0..n)
    }
}

/// Replays a fixed script of draws.
///
/// Uniform and integer draws are kept in separate queues. When a queue runs
/// dry it keeps returning its fallback (`1.0` for uniform draws, so no
/// probability threshold below 1.0 fires, and `0` for integer draws).
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    uniforms: VecDeque<f64>,
    ints: VecDeque<usize>,
}

impl ScriptedRandom {
    pub fn new(uniforms: impl IntoIterator<Item = f64>, ints: impl IntoIterator<Item = usize>) -> Self {
        Self {
            uniforms: uniforms.into_iter().collect(),
            ints: ints.into_iter().collect(),
        }
    }

    /// Draws left in the script.
    pub fn remaining(&self) -> (usize, usize) {
        (self.uniforms.len(), self.ints.len())
    }
}

impl RandomSource for ScriptedRandom {
    fn uniform(&mut self) -> f64 {
        self.uniforms.pop_front().unwrap_or(1.0)
    }

    fn int_range(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        self.ints.pop_front().unwrap_or(0) % n
    }
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn uniform(&mut self) -> f64 {
        (**self).uniform()
    }

    fn int_range(&mut self, n: usize) -> usize {
        (**self).int_range(n)
    }
}
