//! Scheduler configuration and run reporting.

use chrono::Duration;
use serde::Serialize;

/// Tunables for the reminder run.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    /// How far before `scheduled_for` a reminder should fire.
    pub lead_time: Duration,
    /// Posts overdue by more than this are skipped and left for manual
    /// handling. `None` (the default) means no cutoff: a very late post
    /// still gets its single send.
    pub stale_after: Option<Duration>,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lead_time: Duration::minutes(120),
            stale_after: None,
        }
    }
}

/// Per-run counts, for observability only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Candidates matched by the window query.
    pub found: usize,
    /// Reminders successfully sent and committed.
    pub sent: usize,
    /// Candidates whose dispatch failed; their claims were released.
    pub failed: usize,
}
