//! Date normalization between the table and the service.
//!
//! The table stores inclusive dates: a two-day entry ends on its last day.
//! The service's all-day events end on the first day AFTER the last one.
//! Classification is total: every (start, end) pair maps to exactly one
//! window shape.

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::model::EventWindow;

/// Broad shape of a window, for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowShape {
    AllDaySingle,
    AllDayMulti,
    Timed,
}

impl EventWindow {
    pub fn shape(&self) -> WindowShape {
        match self {
            EventWindow::AllDay { .. } if self.all_day_span() <= Some(1) => {
                WindowShape::AllDaySingle
            }
            EventWindow::AllDay { .. } => WindowShape::AllDayMulti,
            EventWindow::Timed { .. } => WindowShape::Timed,
        }
    }
}

/// Whether a table datetime carries no time-of-day.
pub fn is_date_only(dt: NaiveDateTime) -> bool {
    dt.time() == NaiveTime::MIN
}

/// Classify a record's (start, end) into its service window.
///
/// - start at midnight, end blank or on the same day: single all-day.
/// - start and end both at midnight, end later: multi-day all-day with
///   the exclusive boundary one day past the inclusive end.
/// - any time-of-day: timed; a blank end gets `default_minutes` from
///   start.
pub fn desired_window(
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    default_minutes: i64,
) -> EventWindow {
    match end {
        None if is_date_only(start) => EventWindow::AllDay {
            start: start.date(),
            end_exclusive: start.date() + Duration::days(1),
        },
        Some(end) if is_date_only(start) && is_date_only(end) => {
            if end.date() <= start.date() {
                EventWindow::AllDay {
                    start: start.date(),
                    end_exclusive: start.date() + Duration::days(1),
                }
            } else {
                EventWindow::AllDay {
                    start: start.date(),
                    end_exclusive: end.date() + Duration::days(1),
                }
            }
        }
        Some(end) => EventWindow::Timed { start, end },
        None => EventWindow::Timed {
            start,
            end: start + Duration::minutes(default_minutes),
        },
    }
}

/// Map a service window back to table (start, end) values.
///
/// A one-day all-day window leaves end blank; a longer one stores the
/// inclusive last day. Feeding the result back through [`desired_window`]
/// reproduces the identical service boundaries.
pub fn window_to_table(window: &EventWindow) -> (NaiveDateTime, Option<NaiveDateTime>) {
    match window {
        EventWindow::AllDay {
            start,
            end_exclusive,
        } => {
            let start_dt = start.and_time(NaiveTime::MIN);
            let days = end_exclusive.signed_duration_since(*start).num_days();
            if days <= 1 {
                (start_dt, None)
            } else {
                (
                    start_dt,
                    Some((*end_exclusive - Duration::days(1)).and_time(NaiveTime::MIN)),
                )
            }
        }
        EventWindow::Timed { start, end } => (*start, Some(*end)),
    }
}
