//! Bidirectional table/calendar synchronization.
//!
//! Two mutable replicas -- the table and the calendar service -- with no
//! shared transaction log. Reconciliation is last-writer-wins on whole
//! records, driven by three timestamps: the service event's last-modified,
//! the table's snapshot of it, and the user's last edit.

pub mod archive;
pub mod compact;
pub mod engine;
pub mod normalize;
pub mod pull;
pub mod push;
pub mod sort;
pub mod validate;

#[cfg(test)]
pub mod support;

#[cfg(test)]
mod push_tests;

pub use archive::{DrainLock, DrainOutcome};
pub use engine::{CycleReport, SyncEngine, TableStatus};
pub use normalize::{desired_window, window_to_table, WindowShape};
pub use pull::PullOutcome;
pub use push::PushOutcome;
