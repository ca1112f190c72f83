//! Push engine tests.
//!
//! Cooldowns are zeroed via `SyncConfig::immediate()` so throttle and
//! retry behavior is observable through the outcome counters alone.

use crate::config::SyncConfig;
use crate::error::{CoreError, ServiceError};
use crate::model::EventWindow;
use crate::storage::{ArchiveLog, TableStore};
use crate::sync::push::push;
use crate::sync::support::*;

fn cfg() -> SyncConfig {
    SyncConfig::immediate()
}

#[test]
fn creates_event_for_untracked_row() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    cal.now = t(30);

    let mut row = untracked_row(&schema, "Kickoff", Some(dt(2025, 3, 10, 0, 0)), None);
    schema.set_color(&mut row, Some(7));
    db.append_rows(&[row]).unwrap();

    let outcome = push(&mut db, &mut cal, &schema, &cfg(), window(), t(40)).unwrap();

    assert_eq!(outcome.created, 1);
    let event = &cal.events[0];
    assert_eq!(event.title, "Kickoff");
    assert_eq!(event.color, Some(7));
    assert_eq!(
        event.window,
        EventWindow::AllDay {
            start: d(2025, 3, 10),
            end_exclusive: d(2025, 3, 11),
        }
    );

    let rec = schema.record(&db.read_rows().unwrap()[0]);
    assert_eq!(rec.event_id.as_deref(), Some(event.id.as_str()));
    assert_eq!(rec.registered_at, Some(t(30))); // the created event's stamp
    assert_eq!(rec.synced_at, Some(t(40)));
}

#[test]
fn multi_day_create_uses_exclusive_end() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    db.append_rows(&[untracked_row(
        &schema,
        "Offsite",
        Some(dt(2025, 3, 10, 0, 0)),
        Some(dt(2025, 3, 12, 0, 0)),
    )])
    .unwrap();

    push(&mut db, &mut cal, &schema, &cfg(), window(), t(0)).unwrap();

    assert_eq!(
        cal.events[0].window,
        EventWindow::AllDay {
            start: d(2025, 3, 10),
            end_exclusive: d(2025, 3, 13),
        }
    );
}

#[test]
fn timed_row_without_end_gets_default_duration() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    db.append_rows(&[untracked_row(
        &schema,
        "Call",
        Some(dt(2025, 3, 10, 14, 0)),
        None,
    )])
    .unwrap();

    push(&mut db, &mut cal, &schema, &cfg(), window(), t(0)).unwrap();

    assert_eq!(
        cal.events[0].window,
        EventWindow::Timed {
            start: dt(2025, 3, 10, 14, 0),
            end: dt(2025, 3, 10, 15, 0),
        }
    );
}

#[test]
fn rows_without_start_are_not_publishable() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    db.append_rows(&[untracked_row(&schema, "Someday", None, None)])
        .unwrap();

    let outcome = push(&mut db, &mut cal, &schema, &cfg(), window(), t(0)).unwrap();

    assert_eq!(outcome.created, 0);
    assert!(cal.events.is_empty());
}

#[test]
fn edit_newer_than_both_clocks_pushes() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    let id = cal.add_all_day("Old name", d(2025, 3, 10), 1, t(10)); // T2
    cal.now = t(40);

    db.append_rows(&[linked_row(
        &schema,
        "New name",
        Some(dt(2025, 3, 10, 0, 0)),
        None,
        &id,
        t(0),          // T1 registered
        t(0),
        Some(t(30)),   // T3 edited: newer than T1 and T2
    )])
    .unwrap();

    let outcome = push(&mut db, &mut cal, &schema, &cfg(), window(), t(40)).unwrap();

    assert_eq!(outcome.updated, 1);
    assert_eq!(cal.event(&id).unwrap().title, "New name");
    // Any applied change stamps the sync point forward.
    let rec = schema.record(&db.read_rows().unwrap()[0]);
    assert_eq!(rec.registered_at, Some(t(40)));
}

#[test]
fn service_side_newer_change_suppresses_the_push() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    let id = cal.add_all_day("Service name", d(2025, 3, 10), 1, t(50)); // T2 newest

    db.append_rows(&[linked_row(
        &schema,
        "Stale local edit",
        Some(dt(2025, 3, 10, 0, 0)),
        None,
        &id,
        t(0),
        t(0),
        Some(t(30)), // T3 older than T2
    )])
    .unwrap();

    let outcome = push(&mut db, &mut cal, &schema, &cfg(), window(), t(60)).unwrap();

    assert_eq!(outcome.updated, 0);
    assert_eq!(cal.event(&id).unwrap().title, "Service name");
    assert_eq!(cal.update_calls, 0);
}

#[test]
fn already_synced_edit_is_not_repushed() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    let id = cal.add_all_day("Name", d(2025, 3, 10), 1, t(10));

    db.append_rows(&[linked_row(
        &schema,
        "Name",
        Some(dt(2025, 3, 10, 0, 0)),
        None,
        &id,
        t(40), // registered after the edit: a previous sync took it
        t(40),
        Some(t(30)),
    )])
    .unwrap();

    let outcome = push(&mut db, &mut cal, &schema, &cfg(), window(), t(60)).unwrap();
    assert_eq!(outcome.updated, 0);
    assert_eq!(cal.update_calls, 0);
}

#[test]
fn orphan_is_relabeled_and_never_recreated() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();

    db.append_rows(&[linked_row(
        &schema,
        "Deleted upstream",
        Some(dt(2025, 3, 10, 0, 0)),
        None,
        "evt-gone",
        t(0),
        t(0),
        Some(t(30)),
    )])
    .unwrap();

    let outcome = push(&mut db, &mut cal, &schema, &cfg(), window(), t(40)).unwrap();

    assert_eq!(outcome.orphaned, 1);
    assert_eq!(outcome.created, 0);
    assert_eq!(cal.create_calls, 0);

    let rec = schema.record(&db.read_rows().unwrap()[0]);
    assert_eq!(rec.title, "NOSYNC Deleted upstream");
    assert_eq!(rec.event_id, None);
    // The edit stamp survives; only identity was stripped.
    assert_eq!(rec.edited_at, Some(t(30)));
}

#[test]
fn shape_change_deletes_and_recreates() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    let id = cal.add_all_day("Workshop", d(2025, 3, 10), 1, t(10));
    cal.now = t(40);

    // The user gave the entry a time of day: all-day -> timed.
    db.append_rows(&[linked_row(
        &schema,
        "Workshop",
        Some(dt(2025, 3, 10, 9, 0)),
        Some(dt(2025, 3, 10, 12, 0)),
        &id,
        t(0),
        t(0),
        Some(t(30)),
    )])
    .unwrap();

    let outcome = push(&mut db, &mut cal, &schema, &cfg(), window(), t(40)).unwrap();

    assert_eq!(outcome.updated, 1);
    assert_eq!(cal.delete_calls, vec![id.clone()]);
    assert!(cal.event(&id).is_none());

    let rec = schema.record(&db.read_rows().unwrap()[0]);
    let new_id = rec.event_id.clone().unwrap();
    assert_ne!(new_id, id);
    assert_eq!(
        cal.event(&new_id).unwrap().window,
        EventWindow::Timed {
            start: dt(2025, 3, 10, 9, 0),
            end: dt(2025, 3, 10, 12, 0),
        }
    );
}

#[test]
fn multi_day_boundary_change_recreates() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    let id = cal.add_all_day("Offsite", d(2025, 3, 10), 3, t(10));
    cal.now = t(40);

    // Same shape (multi-day all-day), moved by one day.
    db.append_rows(&[linked_row(
        &schema,
        "Offsite",
        Some(dt(2025, 3, 11, 0, 0)),
        Some(dt(2025, 3, 13, 0, 0)),
        &id,
        t(0),
        t(0),
        Some(t(30)),
    )])
    .unwrap();

    push(&mut db, &mut cal, &schema, &cfg(), window(), t(40)).unwrap();

    assert_eq!(cal.delete_calls, vec![id]);
    let rec = schema.record(&db.read_rows().unwrap()[0]);
    let new_id = rec.event_id.unwrap();
    assert_eq!(
        cal.event(&new_id).unwrap().window,
        EventWindow::AllDay {
            start: d(2025, 3, 11),
            end_exclusive: d(2025, 3, 14),
        }
    );
}

#[test]
fn timed_window_change_mutates_in_place() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    let id = cal.add_timed(
        "Call",
        dt(2025, 3, 10, 14, 0),
        dt(2025, 3, 10, 15, 0),
        t(10),
    );
    cal.now = t(40);

    db.append_rows(&[linked_row(
        &schema,
        "Call",
        Some(dt(2025, 3, 10, 16, 0)),
        Some(dt(2025, 3, 10, 17, 0)),
        &id,
        t(0),
        t(0),
        Some(t(30)),
    )])
    .unwrap();

    push(&mut db, &mut cal, &schema, &cfg(), window(), t(40)).unwrap();

    assert!(cal.delete_calls.is_empty());
    assert_eq!(
        cal.event(&id).unwrap().window,
        EventWindow::Timed {
            start: dt(2025, 3, 10, 16, 0),
            end: dt(2025, 3, 10, 17, 0),
        }
    );
}

#[test]
fn unchanged_window_touches_nothing_but_changed_fields() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    let id = cal.add_all_day("Old title", d(2025, 3, 10), 1, t(10));
    cal.now = t(40);

    db.append_rows(&[linked_row(
        &schema,
        "New title",
        Some(dt(2025, 3, 10, 0, 0)),
        None,
        &id,
        t(0),
        t(0),
        Some(t(30)),
    )])
    .unwrap();

    push(&mut db, &mut cal, &schema, &cfg(), window(), t(40)).unwrap();

    // Exactly one setter call: the title.
    assert_eq!(cal.update_calls, 1);
    assert_eq!(cal.event(&id).unwrap().title, "New title");
}

#[test]
fn batch_pause_after_every_threshold_creations() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    let mut config = cfg();
    config.create_batch_size = 2;

    let rows: Vec<_> = (0..5)
        .map(|i| {
            untracked_row(
                &schema,
                &format!("Entry {i}"),
                Some(dt(2025, 3, 10 + i, 0, 0)),
                None,
            )
        })
        .collect();
    db.append_rows(&rows).unwrap();

    let outcome = push(&mut db, &mut cal, &schema, &config, window(), t(0)).unwrap();

    assert_eq!(outcome.created, 5);
    assert_eq!(outcome.batch_pauses, 2);
}

#[test]
fn rate_limited_create_is_retried_exactly_once() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    cal.create_errors
        .push_back(ServiceError::RateLimited("quota".into()));

    db.append_rows(&[untracked_row(
        &schema,
        "Kickoff",
        Some(dt(2025, 3, 10, 0, 0)),
        None,
    )])
    .unwrap();

    let outcome = push(&mut db, &mut cal, &schema, &cfg(), window(), t(0)).unwrap();

    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.retries, 1);
    assert_eq!(cal.create_calls, 2);
}

#[test]
fn second_rate_limit_aborts_the_cycle() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    cal.create_errors
        .push_back(ServiceError::RateLimited("quota".into()));
    cal.create_errors
        .push_back(ServiceError::RateLimited("quota".into()));

    db.append_rows(&[untracked_row(
        &schema,
        "Kickoff",
        Some(dt(2025, 3, 10, 0, 0)),
        None,
    )])
    .unwrap();

    let err = push(&mut db, &mut cal, &schema, &cfg(), window(), t(0)).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Service(ServiceError::RateLimited(_))
    ));
    // The row keeps no identity from the failed attempt.
    assert_eq!(schema.record(&db.read_rows().unwrap()[0]).event_id, None);
}

#[test]
fn non_retryable_create_failure_is_fatal_immediately() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    cal.create_errors.push_back(ServiceError::Http {
        status: 500,
        message: "backend".into(),
    });

    db.append_rows(&[untracked_row(
        &schema,
        "Kickoff",
        Some(dt(2025, 3, 10, 0, 0)),
        None,
    )])
    .unwrap();

    let err = push(&mut db, &mut cal, &schema, &cfg(), window(), t(0)).unwrap_err();
    assert!(matches!(err, CoreError::Service(ServiceError::Http { .. })));
    assert_eq!(cal.create_calls, 1);
}

#[test]
fn rows_pending_retirement_are_skipped() {
    let (mut db, schema) = test_store();
    let mut cal = FakeCalendar::new();
    let id = cal.add_all_day("Archived", d(2025, 3, 10), 1, t(10));

    // The id is already in the archive log: retire is pending.
    let mut row = linked_row(
        &schema,
        "Archived",
        Some(dt(2025, 3, 10, 0, 0)),
        None,
        &id,
        t(0),
        t(0),
        Some(t(30)),
    );
    db.append_archive(&[schema.archive_row(&row)]).unwrap();
    schema.set_title(&mut row, "Archived but edited");
    db.append_rows(&[row]).unwrap();

    let outcome = push(&mut db, &mut cal, &schema, &cfg(), window(), t(40)).unwrap();

    assert_eq!(outcome.updated, 0);
    assert_eq!(cal.update_calls, 0);
    assert_eq!(cal.event(&id).unwrap().title, "Archived");
}
