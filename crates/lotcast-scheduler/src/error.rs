//! Error types for the scheduler.

use thiserror::Error;

use lotcast_core::{GroupId, ProfileId};

/// Errors that can occur during a reminder run.
///
/// Storage errors outside a candidate's dispatch abort the whole run;
/// everything else is isolated to the candidate it came from.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] lotcast_db::StoreError),

    /// External collaborator failure.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] lotcast_dispatch::DispatchError),

    /// A post references an author that no longer exists.
    #[error("author profile not found: {0}")]
    MissingAuthor(ProfileId),

    /// A post references a group that no longer exists.
    #[error("group not found: {0}")]
    MissingGroup(GroupId),
}
