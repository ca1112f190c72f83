//! Core data types shared by the table store and the calendar service.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// One table cell.
///
/// Rows persist as JSON arrays of these, so the variant tag is part of the
/// on-disk format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Checkbox semantics: a checked box is `Bool(true)`; imported sheets
    /// sometimes carry the literal string instead.
    pub fn is_checked(&self) -> bool {
        match self {
            CellValue::Bool(b) => *b,
            CellValue::Text(s) => s == "TRUE",
            _ => false,
        }
    }

    /// The cell rendered as display text (empty string for `Empty`).
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            CellValue::DateTime(dt) => {
                if dt.time() == NaiveTime::MIN {
                    dt.format("%d/%m/%y").to_string()
                } else {
                    dt.format("%d/%m/%y %H:%M").to_string()
                }
            }
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(dt: NaiveDateTime) -> Self {
        CellValue::DateTime(dt)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// One table row: cells in header order.
pub type Row = Vec<CellValue>;

/// The time window of a service event, with the all-day flag made explicit
/// in the type.
///
/// All-day events use the service convention: `end_exclusive` is the first
/// day NOT covered. The table stores the inclusive last day instead; the
/// normalizer converts between the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventWindow {
    AllDay {
        start: NaiveDate,
        end_exclusive: NaiveDate,
    },
    Timed {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

impl EventWindow {
    pub fn is_all_day(&self) -> bool {
        matches!(self, EventWindow::AllDay { .. })
    }

    /// Number of calendar days an all-day window covers; `None` for timed.
    pub fn all_day_span(&self) -> Option<i64> {
        match self {
            EventWindow::AllDay {
                start,
                end_exclusive,
            } => Some(end_exclusive.signed_duration_since(*start).num_days()),
            EventWindow::Timed { .. } => None,
        }
    }
}

/// One live event in the calendar service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    /// Service-assigned, stable.
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: String,
    /// Guest addresses, in service order.
    pub guests: Vec<String>,
    /// Service color id; meaningful values are 1..=11.
    pub color: Option<u8>,
    pub window: EventWindow,
    /// Service-assigned, monotonic per event, bumped on any mutation.
    pub last_modified_at: DateTime<Utc>,
}

/// Payload for creating a new service event.
///
/// Creation sends only title + window; color follows immediately after,
/// everything else reaches the service through the update path.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub window: EventWindow,
}

/// Lifecycle state of a table row with respect to the live service events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    /// No event id yet; will be promoted by the push engine.
    Untracked,
    /// Event id matches a live service event.
    Linked,
    /// Event id set but no live event carries it.
    Orphaned,
}

/// A decoded view of one row's tracked fields. Passthrough cells stay in
/// the row itself and are never copied here.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Comma-separated guest addresses, as stored in the cell.
    pub guests: String,
    pub color: Option<u8>,
    pub event_id: Option<String>,
    /// The service event's last-modified as of the last successful sync.
    pub registered_at: Option<DateTime<Utc>>,
    /// When a sync last wrote this row (import or create).
    pub synced_at: Option<DateTime<Utc>>,
    /// Last user edit to a tracked field, via the mark-edited API.
    pub edited_at: Option<DateTime<Utc>>,
    pub archive: bool,
}

impl Record {
    pub fn state(&self, live_ids: &std::collections::HashSet<String>) -> RecordState {
        match &self.event_id {
            None => RecordState::Untracked,
            Some(id) if live_ids.contains(id) => RecordState::Linked,
            Some(_) => RecordState::Orphaned,
        }
    }
}
