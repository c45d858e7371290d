//! Deterministic array-to-scalar folds for `kernel.reduce`.
//!
//! Sums use a fixed binary tree whose pairing depends only on lane index, so
//! a given buffer always reduces to the same bits no matter how it was
//! produced:
//!
//! ```text
//! Lanes:   [l0, l1, l2, l3, l4]
//!
//! Level 0: l0+l1  l2+l3  l4
//! Level 1: (l0+l1)+(l2+l3)  l4
//! Level 2: ((l0+l1)+(l2+l3))+l4
//! ```
//!
//! An empty array reduces to 0.0 for every operation. A uniform array (every
//! lane equal) reduces exactly: `n * v` for sums and `v` for means, so a
//! broadcast followed by a reduce recovers its scalar.

use lumen_ir::ReduceOp;

/// Fold `values` pairwise by index until one remains.
///
/// Returns `None` for an empty slice.
///
/// # Example
///
/// ```
/// use lumen_runtime::reductions::tree_reduce;
///
/// let total = tree_reduce(&[1.0, 2.0, 3.0, 4.0, 5.0], |a, b| a + b);
/// assert_eq!(total, Some(15.0));
/// ```
pub fn tree_reduce<T, F>(values: &[T], op: F) -> Option<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    match values {
        [] => return None,
        [only] => return Some(*only),
        _ => {}
    }

    let mut current: Vec<T> = values.to_vec();
    let mut next: Vec<T> = Vec::with_capacity(values.len().div_ceil(2));

    while current.len() > 1 {
        next.clear();
        for pair in current.chunks(2) {
            match *pair {
                [a, b] => next.push(op(a, b)),
                [odd] => next.push(odd),
                _ => {}
            }
        }
        std::mem::swap(&mut current, &mut next);
    }

    current.first().copied()
}

/// The shared value when every lane holds the same number.
fn uniform(values: &[f64]) -> Option<f64> {
    let (&first, rest) = values.split_first()?;
    rest.iter().all(|&v| v == first).then_some(first)
}

/// Tree sum; 0.0 when empty.
pub fn sum(values: &[f64]) -> f64 {
    if let Some(v) = uniform(values) {
        return values.len() as f64 * v;
    }
    tree_reduce(values, |a, b| a + b).unwrap_or(0.0)
}

/// `sum / len`; 0.0 when empty.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    if let Some(v) = uniform(values) {
        return v;
    }
    sum(values) / values.len() as f64
}

/// Smallest value; 0.0 when empty.
pub fn min(values: &[f64]) -> f64 {
    tree_reduce(values, f64::min).unwrap_or(0.0)
}

/// Largest value; 0.0 when empty.
pub fn max(values: &[f64]) -> f64 {
    tree_reduce(values, f64::max).unwrap_or(0.0)
}

/// Apply a reduce operation to single-component lanes.
pub fn reduce(op: ReduceOp, values: &[f64]) -> f64 {
    match op {
        ReduceOp::Min => min(values),
        ReduceOp::Max => max(values),
        ReduceOp::Sum => sum(values),
        ReduceOp::Avg => mean(values),
    }
}
