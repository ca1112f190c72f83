//! Row deletion with index-stable batching.
//!
//! Deleting rows one at a time from the top shifts every lower index and
//! invalidates indices computed before the loop. Deleting bottom-up in
//! coalesced runs keeps every not-yet-processed index valid and issues the
//! minimum number of structural deletes.

use crate::error::StoreError;
use crate::storage::TableStore;

/// Coalesce row indices into maximal contiguous runs, returned as
/// `(start, count)` pairs ordered bottom-up (descending start).
pub fn coalesce_runs(indices: &[usize]) -> Vec<(usize, usize)> {
    if indices.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<usize> = indices.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();

    let mut runs = Vec::new();
    let mut count = 1;
    for i in 1..sorted.len() {
        if sorted[i] == sorted[i - 1] - 1 {
            count += 1;
        } else {
            runs.push((sorted[i - 1], count));
            count = 1;
        }
    }
    runs.push((sorted[sorted.len() - 1], count));
    runs
}

/// Delete the given row indices, bottom-up, one range-delete per run.
/// Returns the number of delete calls issued.
pub fn delete_rows<S: TableStore + ?Sized>(
    store: &mut S,
    indices: &[usize],
) -> Result<usize, StoreError> {
    let runs = coalesce_runs(indices);
    for &(start, count) in &runs {
        store.delete_range(start, count)?;
    }
    Ok(runs.len())
}
