//! Pull engine: service -> table.
//!
//! Purely table-mutating; the service is never written in this direction.
//! Removals are structural and go through the row compactor; field updates
//! rewrite the data region in place.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};

use crate::error::CoreError;
use crate::model::{ExternalEvent, Row};
use crate::schema::Schema;
use crate::service::CalendarService;
use crate::storage::TableStore;
use crate::sync::{compact, normalize};

/// What one pull pass did to the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PullOutcome {
    /// New rows appended for events the table had never seen.
    pub imported: usize,
    /// Rows whose fields were overwritten from a newer event.
    pub updated: usize,
    /// Rows removed because their event vanished from the service.
    pub removed: usize,
}

impl PullOutcome {
    /// Whether the pass inserted or deleted rows.
    pub fn structural(&self) -> bool {
        self.imported > 0 || self.removed > 0
    }
}

/// Overwrite every syncable field of a row from a service event.
pub fn apply_event_to_row(schema: &Schema, row: &mut Row, event: &ExternalEvent, now: DateTime<Utc>) {
    let (start, end) = normalize::window_to_table(&event.window);
    schema.set_title(row, &event.title);
    schema.set_description(row, &event.description);
    schema.set_location(row, &event.location);
    schema.set_guests(row, &event.guests.join(","));
    schema.set_color(row, event.color);
    schema.set_start(row, Some(start));
    schema.set_end(row, end);
    schema.set_event_id(row, Some(&event.id));
    schema.set_registered_at(row, Some(event.last_modified_at));
    schema.set_synced_at(row, Some(now));
}

/// Run one pull pass over the scan window.
pub fn pull<S, C>(
    store: &mut S,
    service: &mut C,
    schema: &Schema,
    window: (NaiveDate, NaiveDate),
    now: DateTime<Utc>,
) -> Result<PullOutcome, CoreError>
where
    S: TableStore + ?Sized,
    C: CalendarService + ?Sized,
{
    let events = service.list_events(window.0, window.1)?;
    let rows = store.read_rows()?;

    // First contact: seed the table from the service.
    if rows.is_empty() {
        let seeded: Vec<Row> = events
            .iter()
            .map(|event| {
                let mut row = schema.new_row();
                apply_event_to_row(schema, &mut row, event, now);
                row
            })
            .collect();
        store.append_rows(&seeded)?;
        return Ok(PullOutcome {
            imported: seeded.len(),
            ..PullOutcome::default()
        });
    }

    let by_id: HashMap<&str, &ExternalEvent> =
        events.iter().map(|e| (e.id.as_str(), e)).collect();
    let row_ids: HashSet<String> = rows
        .iter()
        .filter_map(|row| schema.event_id(row))
        .collect();

    // Rows whose event vanished are removals, not field updates.
    let doomed: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| {
            schema
                .event_id(row)
                .is_some_and(|id| !by_id.contains_key(id.as_str()))
        })
        .map(|(i, _)| i)
        .collect();

    let mut kept: Vec<Row> = rows
        .iter()
        .enumerate()
        .filter(|(i, _)| !doomed.contains(i))
        .map(|(_, row)| row.clone())
        .collect();

    let mut updated = 0;
    for row in kept.iter_mut() {
        let Some(id) = schema.event_id(row) else {
            continue;
        };
        let Some(event) = by_id.get(id.as_str()) else {
            continue;
        };
        let registered = schema
            .registered_at(row)
            .unwrap_or(DateTime::UNIX_EPOCH);
        // Strictly newer on the service side; a tie means the table
        // already reflects the event.
        if event.last_modified_at > registered {
            apply_event_to_row(schema, row, event, now);
            updated += 1;
        }
    }

    let fresh: Vec<Row> = events
        .iter()
        .filter(|event| !row_ids.contains(&event.id))
        .map(|event| {
            let mut row = schema.new_row();
            apply_event_to_row(schema, &mut row, event, now);
            row
        })
        .collect();

    if !doomed.is_empty() {
        compact::delete_rows(store, &doomed)?;
    }
    if updated > 0 {
        store.overwrite_rows(&kept)?;
    }
    if !fresh.is_empty() {
        store.append_rows(&fresh)?;
    }

    Ok(PullOutcome {
        imported: fresh.len(),
        updated,
        removed: doomed.len(),
    })
}
