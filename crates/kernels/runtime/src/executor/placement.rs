//! Procedural per-lane identity and placement.
//!
//! All values are pure functions of (instance seed, layout, lane, lane count),
//! so re-materializing an instance always yields the same lanes.

use std::f64::consts::TAU;

use lumen_foundation::{halton, RngStream};
use lumen_ir::LayoutPolicy;

/// `i / (n - 1)`; 0 for a single lane.
pub(super) fn normalized_index(lane: usize, count: usize) -> f64 {
    if count > 1 {
        lane as f64 / (count - 1) as f64
    } else {
        0.0
    }
}

/// `i / n`, in [0, 1).
pub(super) fn rank(lane: usize, count: usize) -> f64 {
    if count > 0 {
        lane as f64 / count as f64
    } else {
        0.0
    }
}

/// Stable random identity in [0, 1).
pub(super) fn random_id(seed: u64, lane: usize) -> f64 {
    RngStream::derive(seed, "random_id")
        .for_lane(lane as u64)
        .uniform()
}

/// Placement seed in [0, 1), independent of [`random_id`].
pub(super) fn placement_seed(seed: u64, lane: usize) -> f64 {
    RngStream::derive(seed, "placement.seed")
        .for_lane(lane as u64)
        .uniform()
}

/// Position in the unit square.
pub(super) fn uv(layout: LayoutPolicy, lane: usize, count: usize) -> [f64; 2] {
    match layout {
        LayoutPolicy::Unordered => {
            let i = lane as u64 + 1;
            [halton(i, 2), halton(i, 3)]
        }
        LayoutPolicy::Line => [normalized_index(lane, count), 0.5],
        LayoutPolicy::Grid { columns } => {
            let cols = (columns as usize).max(1);
            let rows = count.div_ceil(cols).max(1);
            let col = lane % cols;
            let row = lane / cols;
            [
                (col as f64 + 0.5) / cols as f64,
                (row as f64 + 0.5) / rows as f64,
            ]
        }
        LayoutPolicy::Circle => {
            let angle = TAU * rank(lane, count);
            [0.5 + 0.5 * angle.cos(), 0.5 + 0.5 * angle.sin()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_index_endpoints() {
        assert_eq!(normalized_index(0, 5), 0.0);
        assert_eq!(normalized_index(4, 5), 1.0);
        assert_eq!(normalized_index(0, 1), 0.0);
    }

    #[test]
    fn test_random_ids_are_stable_and_distinct() {
        let a = random_id(42, 3);
        assert_eq!(a, random_id(42, 3));
        assert_ne!(a, random_id(42, 4));
        assert_ne!(a, random_id(43, 3));
        assert_ne!(a, placement_seed(42, 3));
        assert!((0.0..1.0).contains(&a));
    }

    #[test]
    fn test_grid_centres_cells() {
        let layout = LayoutPolicy::Grid { columns: 2 };
        assert_eq!(uv(layout, 0, 4), [0.25, 0.25]);
        assert_eq!(uv(layout, 3, 4), [0.75, 0.75]);
    }

    #[test]
    fn test_circle_stays_in_unit_square() {
        for lane in 0..16 {
            let [u, v] = uv(LayoutPolicy::Circle, lane, 16);
            assert!((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v));
        }
        assert_eq!(uv(LayoutPolicy::Circle, 0, 4), [1.0, 0.5]);
    }

    #[test]
    fn test_unordered_uses_halton() {
        assert_eq!(uv(LayoutPolicy::Unordered, 0, 8), [0.5, 1.0 / 3.0]);
    }
}
