//! Calendar service boundary.
//!
//! The sync engine talks to [`CalendarService`] only; the Google client is
//! one implementation. Every failure crossing this boundary is already
//! classified into [`crate::error::ServiceError`] -- callers branch on the
//! type, never on message text.

pub mod google;

pub use google::GoogleCalendarClient;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::ServiceError;
use crate::model::{EventDraft, ExternalEvent};

/// Operations the sync needs from the calendar-like service.
pub trait CalendarService {
    /// Live events with any overlap of `[begin, end)`.
    fn list_events(
        &mut self,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<ExternalEvent>, ServiceError>;

    /// Lookup by id. `Ok(None)` when the event does not exist (a
    /// legitimate answer, not an error).
    fn get_event(&mut self, id: &str) -> Result<Option<ExternalEvent>, ServiceError>;

    fn create_event(&mut self, draft: &EventDraft) -> Result<ExternalEvent, ServiceError>;

    fn set_all_day_window(
        &mut self,
        id: &str,
        start: NaiveDate,
        end_exclusive: NaiveDate,
    ) -> Result<(), ServiceError>;

    fn set_timed_window(
        &mut self,
        id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<(), ServiceError>;

    fn set_title(&mut self, id: &str, title: &str) -> Result<(), ServiceError>;

    fn set_description(&mut self, id: &str, description: &str) -> Result<(), ServiceError>;

    fn set_location(&mut self, id: &str, location: &str) -> Result<(), ServiceError>;

    fn set_color(&mut self, id: &str, color: u8) -> Result<(), ServiceError>;

    fn delete_event(&mut self, id: &str) -> Result<(), ServiceError>;
}
