//! Push engine: table -> service.
//!
//! A row is pushed only when the user's edit postdates both the last sync
//! point and the service's own last change; otherwise the service already
//! reflects the edit, or it has a newer change that a push would clobber.
//! Creations are batched against the service's create-rate ceiling, and a
//! rate-limited call gets exactly one retry after a cooldown.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};

use crate::config::SyncConfig;
use crate::error::{CoreError, ServiceError};
use crate::model::{EventDraft, EventWindow, ExternalEvent};
use crate::schema::Schema;
use crate::service::CalendarService;
use crate::storage::{ArchiveLog, TableStore};
use crate::sync::normalize::{self, WindowShape};

/// What one push pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Events created for previously untracked rows.
    pub created: usize,
    /// Rows whose live event was brought up to date.
    pub updated: usize,
    /// Rows relabeled because their event disappeared service-side.
    pub orphaned: usize,
    /// Cooldown pauses taken between creation batches.
    pub batch_pauses: usize,
    /// Rate-limited calls that succeeded on their single retry.
    pub retries: usize,
}

/// How the live event must change to match the desired window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowAction {
    Keep,
    Mutate,
    Recreate,
}

/// Shape changes always recreate; a same-shape single-day move or timed
/// window change mutates in place; multi-day boundary changes recreate
/// (the service does not reliably mutate the span in place).
fn window_action(desired: &EventWindow, live: &EventWindow) -> WindowAction {
    if desired.shape() != live.shape() {
        return WindowAction::Recreate;
    }
    if desired == live {
        return WindowAction::Keep;
    }
    match desired.shape() {
        WindowShape::AllDaySingle | WindowShape::Timed => WindowAction::Mutate,
        WindowShape::AllDayMulti => WindowAction::Recreate,
    }
}

fn retry_once<T>(
    cfg: &SyncConfig,
    outcome: &mut PushOutcome,
    mut call: impl FnMut() -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    match call() {
        Err(e) if e.is_retryable() => {
            std::thread::sleep(std::time::Duration::from_millis(cfg.create_cooldown_ms));
            let result = call();
            if result.is_ok() {
                outcome.retries += 1;
            }
            result
        }
        other => other,
    }
}

/// Ids already written to the archive log. Rows carrying one are pending
/// retirement and must not be pushed.
fn archived_ids<S: ArchiveLog + ?Sized>(
    store: &S,
    schema: &Schema,
) -> Result<HashSet<String>, CoreError> {
    let col = schema.archive_id_column();
    Ok(store
        .archive_rows()?
        .iter()
        .filter_map(|entry| entry.get(col))
        .filter_map(|cell| cell.as_text())
        .map(str::to_string)
        .collect())
}

/// Run one push pass over the scan window.
pub fn push<S, C>(
    store: &mut S,
    service: &mut C,
    schema: &Schema,
    cfg: &SyncConfig,
    window: (NaiveDate, NaiveDate),
    now: DateTime<Utc>,
) -> Result<PushOutcome, CoreError>
where
    S: TableStore + ArchiveLog + ?Sized,
    C: CalendarService + ?Sized,
{
    let mut outcome = PushOutcome::default();

    let events = service.list_events(window.0, window.1)?;
    let by_id: HashMap<&str, &ExternalEvent> =
        events.iter().map(|e| (e.id.as_str(), e)).collect();
    let archived = archived_ids(store, schema)?;

    let mut rows = store.read_rows()?;
    let mut changed = false;
    let mut created_in_batch = 0usize;

    for row in rows.iter_mut() {
        let record = schema.record(row);

        if let Some(id) = &record.event_id {
            if archived.contains(id) {
                continue;
            }
        }
        let Some(start) = record.start else {
            continue;
        };
        let desired =
            normalize::desired_window(start, record.end, cfg.default_timed_duration_min);

        match &record.event_id {
            Some(id) => match by_id.get(id.as_str()) {
                Some(live) => {
                    let edited = record.edited_at.unwrap_or(DateTime::UNIX_EPOCH);
                    let registered = record.registered_at.unwrap_or(DateTime::UNIX_EPOCH);
                    if !(edited > live.last_modified_at && edited > registered) {
                        continue;
                    }

                    let mut changes = 0usize;
                    let mut current_id = id.clone();
                    // Field baseline for the reconcile below: the live
                    // event, or the bare event a recreate just produced.
                    let mut baseline = (
                        live.title.clone(),
                        live.description.clone(),
                        live.location.clone(),
                        live.color,
                    );

                    match window_action(&desired, &live.window) {
                        WindowAction::Keep => {}
                        WindowAction::Mutate => {
                            match &desired {
                                EventWindow::AllDay {
                                    start,
                                    end_exclusive,
                                } => retry_once(cfg, &mut outcome, || {
                                    service.set_all_day_window(&current_id, *start, *end_exclusive)
                                })?,
                                EventWindow::Timed { start, end } => {
                                    retry_once(cfg, &mut outcome, || {
                                        service.set_timed_window(&current_id, *start, *end)
                                    })?
                                }
                            }
                            changes += 1;
                        }
                        WindowAction::Recreate => {
                            match service.delete_event(&current_id) {
                                Ok(()) => {}
                                Err(e) if e.is_gone() => {}
                                Err(e) => return Err(e.into()),
                            }
                            let draft = EventDraft {
                                title: record.title.clone(),
                                window: desired.clone(),
                            };
                            let created =
                                retry_once(cfg, &mut outcome, || service.create_event(&draft))?;
                            current_id = created.id.clone();
                            baseline = (record.title.clone(), String::new(), String::new(), None);
                            schema.set_event_id(row, Some(&created.id));
                            schema.set_registered_at(row, Some(created.last_modified_at));
                            schema.set_synced_at(row, Some(now));
                            changes += 1;
                        }
                    }

                    if baseline.0 != record.title {
                        retry_once(cfg, &mut outcome, || {
                            service.set_title(&current_id, &record.title)
                        })?;
                        changes += 1;
                    }
                    if baseline.1 != record.description {
                        retry_once(cfg, &mut outcome, || {
                            service.set_description(&current_id, &record.description)
                        })?;
                        changes += 1;
                    }
                    if baseline.2 != record.location {
                        retry_once(cfg, &mut outcome, || {
                            service.set_location(&current_id, &record.location)
                        })?;
                        changes += 1;
                    }
                    if let Some(color) = record.color {
                        if baseline.3 != Some(color) && (1..=11).contains(&color) {
                            retry_once(cfg, &mut outcome, || {
                                service.set_color(&current_id, color)
                            })?;
                            changes += 1;
                        }
                    }

                    if changes > 0 {
                        schema.set_registered_at(row, Some(now));
                        changed = true;
                        outcome.updated += 1;
                    }
                }
                None => {
                    // Service-side deletion: surface it, never recreate.
                    let title = format!("{} {}", cfg.no_sync_marker, record.title);
                    schema.set_title(row, &title);
                    schema.set_event_id(row, None);
                    changed = true;
                    outcome.orphaned += 1;
                }
            },
            None => {
                let draft = EventDraft {
                    title: record.title.clone(),
                    window: desired.clone(),
                };
                let created = retry_once(cfg, &mut outcome, || service.create_event(&draft))?;
                if let Some(color) = record.color {
                    if (1..=11).contains(&color) {
                        retry_once(cfg, &mut outcome, || {
                            service.set_color(&created.id, color)
                        })?;
                    }
                }
                schema.set_event_id(row, Some(&created.id));
                schema.set_registered_at(row, Some(created.last_modified_at));
                schema.set_synced_at(row, Some(now));
                changed = true;
                outcome.created += 1;

                created_in_batch += 1;
                if created_in_batch >= cfg.create_batch_size {
                    std::thread::sleep(std::time::Duration::from_millis(cfg.create_cooldown_ms));
                    outcome.batch_pauses += 1;
                    created_in_batch = 0;
                }
            }
        }
    }

    if changed {
        store.overwrite_rows(&rows)?;
    }
    Ok(outcome)
}
