//! Alternating-adjacent pair scheduling
//!
//! For a ladder `1..=n`, even-numbered rounds pair `(1,2), (3,4), ...` and
//! odd-numbered rounds pair `(2,3), (4,5), ...`. Over any two consecutive
//! rounds every adjacent link is attempted exactly once, and pairs within
//! one round never share a replica, so a round's attempts can be pipelined.

use std::collections::HashSet;

/// The pairs attempted in `round` (counted from 0)
pub fn adjacent_pairs(n_replicas: u32, round: u64) -> Vec<(u32, u32)> {
    let start = if round % 2 == 0 { 1 } else { 2 };
    (start..n_replicas)
        .step_by(2)
        .map(|low| (low, low + 1))
        .collect()
}

/// Every replica touched by the given pairs
pub fn participants(pairs: &[(u32, u32)]) -> HashSet<u32> {
    pairs.iter().flat_map(|&(a, b)| [a, b]).collect()
}
