//! # Planmatrix Core Library
//!
//! Core business logic for Planmatrix: a project matrix (a tabular store
//! of titled, dated entries) kept consistent with an external calendar.
//! All operations are available to the standalone CLI binary; any GUI is a
//! thin layer over this same library.
//!
//! ## Architecture
//!
//! - **Sync engine**: pull (service -> table), push (table -> service),
//!   archive drain, and the cycle that sequences them
//! - **Storage**: SQLite-backed table store and append-only archive log
//! - **Service**: Google Calendar REST client behind a trait boundary
//! - **Auth**: OAuth2 flow with keyring-held credentials
//!
//! ## Key Components
//!
//! - [`SyncEngine`]: cycle orchestration and the inbound edit/archive API
//! - [`MatrixDb`]: table store + archive log persistence
//! - [`GoogleCalendarClient`]: the calendar service implementation
//! - [`Schema`]: typed header schema, resolved once per cycle

pub mod auth;
pub mod config;
pub mod error;
pub mod model;
pub mod schema;
pub mod service;
pub mod storage;
pub mod sync;

pub use config::{Config, SyncConfig};
pub use error::{CoreError, ServiceError, StoreError};
pub use model::{CellValue, EventWindow, ExternalEvent, Record, RecordState, Row};
pub use schema::Schema;
pub use service::{CalendarService, GoogleCalendarClient};
pub use storage::{ArchiveLog, MatrixDb, TableStore};
pub use sync::{CycleReport, SyncEngine, TableStatus};
