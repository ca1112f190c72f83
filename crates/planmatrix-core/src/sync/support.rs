//! In-memory calendar fake and shared fixtures for engine tests.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::ServiceError;
use crate::model::{EventDraft, EventWindow, ExternalEvent, Row};
use crate::schema::{default_header, Schema};
use crate::service::CalendarService;
use crate::storage::MatrixDb;

/// Fresh in-memory store with the default header, plus its schema.
pub fn test_store() -> (MatrixDb, Schema) {
    let db = MatrixDb::open_memory().unwrap();
    let schema = Schema::resolve(&default_header()).unwrap();
    (db, schema)
}

/// The default scan window.
pub fn window() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
    )
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn dt(y: i32, m: u32, day: u32, h: u32, min: u32) -> NaiveDateTime {
    d(y, m, day).and_hms_opt(h, min, 0).unwrap()
}

/// A fixed reference instant; offsets build ordered timestamps around it.
pub fn t(offset_minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(offset_minutes)
}

/// An untracked row: title and dates, no sync identity.
pub fn untracked_row(
    schema: &Schema,
    title: &str,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Row {
    let mut row = schema.new_row();
    schema.set_title(&mut row, title);
    schema.set_start(&mut row, start);
    schema.set_end(&mut row, end);
    row
}

/// A linked row pointing at `event_id` with the given clock state.
#[allow(clippy::too_many_arguments)]
pub fn linked_row(
    schema: &Schema,
    title: &str,
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    event_id: &str,
    registered_at: DateTime<Utc>,
    synced_at: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
) -> Row {
    let mut row = untracked_row(schema, title, start, end);
    schema.set_event_id(&mut row, Some(event_id));
    schema.set_registered_at(&mut row, Some(registered_at));
    schema.set_synced_at(&mut row, Some(synced_at));
    schema.set_edited_at(&mut row, edited_at);
    row
}

/// A scriptable in-memory calendar.
///
/// Mutations stamp `last_modified_at` from the fake's `now`, which tests
/// advance by hand. `create_errors` is a queue of failures injected ahead
/// of successful creations.
pub struct FakeCalendar {
    pub events: Vec<ExternalEvent>,
    pub now: DateTime<Utc>,
    pub create_errors: VecDeque<ServiceError>,
    pub create_calls: usize,
    pub update_calls: usize,
    pub delete_calls: Vec<String>,
    next_id: u32,
}

impl FakeCalendar {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            now: Utc::now(),
            create_errors: VecDeque::new(),
            create_calls: 0,
            update_calls: 0,
            delete_calls: Vec::new(),
            next_id: 1,
        }
    }

    pub fn add_all_day(
        &mut self,
        title: &str,
        start: NaiveDate,
        days: i64,
        last_modified_at: DateTime<Utc>,
    ) -> String {
        let id = self.fresh_id();
        self.events.push(ExternalEvent {
            id: id.clone(),
            title: title.to_string(),
            description: String::new(),
            location: String::new(),
            guests: Vec::new(),
            color: None,
            window: EventWindow::AllDay {
                start,
                end_exclusive: start + Duration::days(days),
            },
            last_modified_at,
        });
        id
    }

    pub fn add_timed(
        &mut self,
        title: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        last_modified_at: DateTime<Utc>,
    ) -> String {
        let id = self.fresh_id();
        self.events.push(ExternalEvent {
            id: id.clone(),
            title: title.to_string(),
            description: String::new(),
            location: String::new(),
            guests: Vec::new(),
            color: None,
            window: EventWindow::Timed { start, end },
            last_modified_at,
        });
        id
    }

    pub fn event(&self, id: &str) -> Option<&ExternalEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn set_last_modified(&mut self, id: &str, at: DateTime<Utc>) {
        if let Some(event) = self.events.iter_mut().find(|e| e.id == id) {
            event.last_modified_at = at;
        }
    }

    fn fresh_id(&mut self) -> String {
        let id = format!("evt-{}", self.next_id);
        self.next_id += 1;
        id
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut ExternalEvent, ServiceError> {
        self.events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }
}

impl Default for FakeCalendar {
    fn default() -> Self {
        Self::new()
    }
}

impl CalendarService for FakeCalendar {
    fn list_events(
        &mut self,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ExternalEvent>, ServiceError> {
        let begin = begin.and_time(NaiveTime::MIN);
        let end = end.and_time(NaiveTime::MIN);
        Ok(self
            .events
            .iter()
            .filter(|e| match &e.window {
                EventWindow::AllDay {
                    start,
                    end_exclusive,
                } => start.and_time(NaiveTime::MIN) < end
                    && end_exclusive.and_time(NaiveTime::MIN) > begin,
                EventWindow::Timed { start, end: e_end } => *start < end && *e_end > begin,
            })
            .cloned()
            .collect())
    }

    fn get_event(&mut self, id: &str) -> Result<Option<ExternalEvent>, ServiceError> {
        Ok(self.event(id).cloned())
    }

    fn create_event(&mut self, draft: &EventDraft) -> Result<ExternalEvent, ServiceError> {
        self.create_calls += 1;
        if let Some(err) = self.create_errors.pop_front() {
            return Err(err);
        }
        let id = self.fresh_id();
        let event = ExternalEvent {
            id,
            title: draft.title.clone(),
            description: String::new(),
            location: String::new(),
            guests: Vec::new(),
            color: None,
            window: draft.window.clone(),
            last_modified_at: self.now,
        };
        self.events.push(event.clone());
        Ok(event)
    }

    fn set_all_day_window(
        &mut self,
        id: &str,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<(), ServiceError> {
        self.update_calls += 1;
        let now = self.now;
        let event = self.find_mut(id)?;
        event.window = EventWindow::AllDay {
            start,
            end_exclusive,
        };
        event.last_modified_at = now;
        Ok(())
    }

    fn set_timed_window(
        &mut self,
        id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<(), ServiceError> {
        self.update_calls += 1;
        let now = self.now;
        let event = self.find_mut(id)?;
        event.window = EventWindow::Timed { start, end };
        event.last_modified_at = now;
        Ok(())
    }

    fn set_title(&mut self, id: &str, title: &str) -> Result<(), ServiceError> {
        self.update_calls += 1;
        let now = self.now;
        let event = self.find_mut(id)?;
        event.title = title.to_string();
        event.last_modified_at = now;
        Ok(())
    }

    fn set_description(&mut self, id: &str, description: &str) -> Result<(), ServiceError> {
        self.update_calls += 1;
        let now = self.now;
        let event = self.find_mut(id)?;
        event.description = description.to_string();
        event.last_modified_at = now;
        Ok(())
    }

    fn set_location(&mut self, id: &str, location: &str) -> Result<(), ServiceError> {
        self.update_calls += 1;
        let now = self.now;
        let event = self.find_mut(id)?;
        event.location = location.to_string();
        event.last_modified_at = now;
        Ok(())
    }

    fn set_color(&mut self, id: &str, color: u8) -> Result<(), ServiceError> {
        self.update_calls += 1;
        let now = self.now;
        let event = self.find_mut(id)?;
        event.color = Some(color);
        event.last_modified_at = now;
        Ok(())
    }

    fn delete_event(&mut self, id: &str) -> Result<(), ServiceError> {
        self.delete_calls.push(id.to_string());
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        if self.events.len() == before {
            return Err(ServiceError::Gone(id.to_string()));
        }
        Ok(())
    }
}
