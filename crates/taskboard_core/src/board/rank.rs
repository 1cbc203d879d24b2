//! Rank allocation for one destination partition.
//!
//! Ranks are plain `i64` values. Allocation never grows precision: when no
//! integer fits between two neighbours the caller renumbers the partition
//! densely (`0..n-1`) instead.

use crate::model::task::Rank;

/// Computes the rank for a task inserted at `target_index`.
///
/// `ranks` is the ascending rank sequence of the destination partition,
/// excluding the moving task. `target_index` is clamped to `[0, len]`.
///
/// Returns `None` when the slot has no free integer: adjacent ranks, equal
/// ranks left behind by a concurrent writer, or the ends of the `i64` domain.
pub fn allocate(ranks: &[Rank], target_index: usize) -> Option<Rank> {
    let index = target_index.min(ranks.len());
    let before = index.checked_sub(1).and_then(|i| ranks.get(i)).copied();
    let after = ranks.get(index).copied();

    match (before, after) {
        (None, None) => Some(0),
        (Some(last), None) => last.checked_add(1),
        (None, Some(first)) => first.checked_sub(1),
        (Some(before), Some(after)) => midpoint(before, after),
    }
}

/// Dense ranks `0, 1, 2, …` for a partition of `len` tasks.
pub fn dense_ranks(len: usize) -> impl Iterator<Item = Rank> {
    (0..).take(len)
}

fn midpoint(before: Rank, after: Rank) -> Option<Rank> {
    let mid = (i128::from(before) + i128::from(after)).div_euclid(2);
    let mid = Rank::try_from(mid).ok()?;
    (before < mid && mid < after).then_some(mid)
}
