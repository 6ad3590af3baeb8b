//! Domain model for Lotcast.
//!
//! This crate holds the pure decision logic of the post scheduler:
//! - The scheduled-post lifecycle state machine
//! - The territory compliance engine and violation-resolution state machine
//! - Compliance-rate aggregation for reporting
//!
//! Nothing in here performs I/O; persistence and dispatch live in the
//! `lotcast-db` and `lotcast-dispatch` crates.

mod compliance;
mod error;
mod lifecycle;
mod types;

pub use compliance::{compliance_rate, evaluate_violation, is_compliant};
pub use error::DomainError;
pub use lifecycle::{can_view_post, is_author};
pub use types::{
    FacebookGroup, GroupId, PostCategory, PostId, PostStatus, Principal, Profile, ProfileId, Role,
    ScheduledPost, Territory, TerritoryId, Violation, ViolationStatus,
};
