//! Deterministic Random Number Generation
//!
//! Per-lane random identities and placement seeds must be a pure function of
//! the instance seed and the lane index: re-materializing the same array in a
//! later frame, or in another program instance, yields identical lanes.
//!
//! # PRNG Algorithm
//!
//! SplitMix64: fast, portable and stateless to derive from.
//!
//! # Stream Model
//!
//! ```text
//! instance seed
//!   └─> derive("random_id") / derive("placement.seed")
//!         └─> for_lane(i)
//!               └─> uniform() -> [0, 1)
//! ```

use crate::stable_hash::fnv1a64_str;

/// A deterministic pseudo-random number stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngStream {
    state: u64,
}

impl RngStream {
    /// Create a new RNG stream from a seed.
    #[inline]
    pub const fn new(seed: u64) -> Self {
        // SplitMix64 degenerates on an all-zero state.
        let state = if seed == 0 { 0x9E3779B97F4A7C15 } else { seed };
        Self { state }
    }

    /// Create a stream by combining a parent seed with a label.
    #[inline]
    pub fn derive(parent_seed: u64, label: &str) -> Self {
        Self::new(splitmix64_mix(parent_seed ^ fnv1a64_str(label)))
    }

    /// Create the substream owned by one lane.
    #[inline]
    pub fn for_lane(&self, lane: u64) -> Self {
        Self::new(splitmix64_mix(self.state ^ splitmix64_mix(lane)))
    }

    /// Get the current internal state.
    #[inline]
    pub const fn state(&self) -> u64 {
        self.state
    }

    /// Generate the next random u64 value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state = splitmix64_next(self.state);
        splitmix64_mix(self.state)
    }

    /// Generate a uniform random f64 in [0, 1).
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        u64_to_f64_01(self.next_u64())
    }
}

/// Radical inverse of `index` in `base`: the `index`-th Halton sample in [0, 1).
///
/// Used for low-discrepancy scatter layouts (bases 2 and 3 for uv).
pub fn halton(mut index: u64, base: u64) -> f64 {
    debug_assert!(base >= 2);
    let mut fraction = 1.0;
    let mut result = 0.0;
    let inv_base = 1.0 / base as f64;
    while index > 0 {
        fraction *= inv_base;
        result += fraction * (index % base) as f64;
        index /= base;
    }
    result
}

#[inline]
const fn splitmix64_next(state: u64) -> u64 {
    state.wrapping_add(0x9E3779B97F4A7C15)
}

#[inline]
const fn splitmix64_mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Upper 53 bits mapped onto [0, 1).
#[inline]
const fn u64_to_f64_01(x: u64) -> f64 {
    (x >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_determinism() {
        let mut a = RngStream::new(42);
        let mut b = RngStream::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_uniform_range() {
        let mut stream = RngStream::new(12345);
        for _ in 0..1000 {
            let val = stream.uniform();
            assert!((0.0..1.0).contains(&val));
        }
    }

    #[test]
    fn test_lanes_are_independent_and_stable() {
        let root = RngStream::derive(7, "random_id");
        let lane3 = root.for_lane(3).uniform();
        assert_eq!(root.for_lane(3).uniform(), lane3);
        assert_ne!(root.for_lane(4).uniform(), lane3);
    }

    #[test]
    fn test_derive_depends_on_label() {
        assert_ne!(
            RngStream::derive(1, "a").state(),
            RngStream::derive(1, "b").state()
        );
    }

    #[test]
    fn test_halton_base2() {
        assert_eq!(halton(0, 2), 0.0);
        assert_eq!(halton(1, 2), 0.5);
        assert_eq!(halton(2, 2), 0.25);
        assert_eq!(halton(3, 2), 0.75);
    }

    #[test]
    fn test_halton_base3() {
        assert!((halton(1, 3) - 1.0 / 3.0).abs() < 1e-12);
        assert!((halton(2, 3) - 2.0 / 3.0).abs() < 1e-12);
        assert!((halton(3, 3) - 1.0 / 9.0).abs() < 1e-12);
    }
}
