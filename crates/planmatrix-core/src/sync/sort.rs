//! Sort stage.
//!
//! Orders the contiguous prefix of date-bearing rows by (start, project,
//! title). Rows after the last row with a parseable start date are working
//! notes and scratch content; they stay exactly where they are.

use crate::error::StoreError;
use crate::schema::Schema;
use crate::storage::TableStore;

/// Sort the date-bearing prefix. Returns whether the table changed.
pub fn sort_date_prefix<S: TableStore + ?Sized>(
    store: &mut S,
    schema: &Schema,
) -> Result<bool, StoreError> {
    let rows = store.read_rows()?;

    let last_dated = match rows.iter().rposition(|row| schema.start(row).is_some()) {
        Some(i) => i,
        None => return Ok(false),
    };

    let mut sorted = rows.clone();
    sorted[..=last_dated].sort_by(|a, b| {
        let key_a = (schema.start(a), schema.project(a), schema.title(a));
        let key_b = (schema.start(b), schema.project(b), schema.title(b));
        // Undated rows inside the prefix sort after dated ones.
        match (key_a.0, key_b.0) {
            (Some(da), Some(db)) => (da, &key_a.1, &key_a.2).cmp(&(db, &key_b.1, &key_b.2)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => (&key_a.1, &key_a.2).cmp(&(&key_b.1, &key_b.2)),
        }
    });

    if sorted == rows {
        return Ok(false);
    }
    store.overwrite_rows(&sorted)?;
    Ok(true)
}
