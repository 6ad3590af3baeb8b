//! Error types for domain operations.

use thiserror::Error;

use crate::types::{PostStatus, ViolationStatus};

/// Errors from illegal domain transitions or invalid input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// The post cannot move from its current status to the requested one.
    #[error("illegal status transition: {from} -> {to}")]
    IllegalStatusTransition { from: PostStatus, to: PostStatus },

    /// Content, timing, and group edits are only allowed before publication.
    #[error("post is not editable while {0}")]
    NotEditable(PostStatus),

    /// A published post cannot be deleted.
    #[error("cannot delete a post that has been marked as posted")]
    DeletePosted,

    /// A violation-resolution action was attempted on a non-violating post.
    #[error("post has no territory violation")]
    NoViolation,

    /// The violation-resolution state machine rejects this transition.
    #[error("illegal violation transition from {from}: {action}")]
    IllegalViolationTransition {
        from: ViolationStatus,
        action: &'static str,
    },

    /// Justifications must carry actual text.
    #[error("justification must not be empty")]
    EmptyJustification,
}
