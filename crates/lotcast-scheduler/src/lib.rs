//! Reminder dispatch scheduler for Lotcast.
//!
//! This crate owns the periodically-invoked reminder run:
//! - Selects posts due within the configured lead-time window
//! - Atomically claims each candidate before any external call
//! - Generates missing copy and sends the notification email
//! - Commits the claim on success, releases it on failure
//!
//! Runs may overlap; the claim in `lotcast-db` guarantees at most one
//! notification per post regardless.

mod error;
mod reminder;
mod types;

pub use error::SchedulerError;
pub use reminder::ReminderScheduler;
pub use types::{ReminderConfig, RunSummary};
