//! Lumen Foundation
//!
//! Core primitives shared by the IR and the runtime: stable FNV-1a hashing
//! (used for structural hash-consing of expression nodes) and deterministic
//! SplitMix64 random streams (used for per-lane identities and placement
//! seeds).

pub mod rng;
pub mod stable_hash;

pub use rng::{halton, RngStream};
pub use stable_hash::{
    fnv1a64, fnv1a64_mix, fnv1a64_str, StableHasher, FNV1A_OFFSET_BASIS_64, FNV1A_PRIME_64,
};
