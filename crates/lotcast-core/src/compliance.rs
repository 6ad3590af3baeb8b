//! Territory compliance engine.
//!
//! Pure decision logic: violation detection, the violation-resolution
//! state machine, and compliance-rate aggregation for reports.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::types::{ProfileId, ScheduledPost, TerritoryId, Violation, ViolationStatus};

/// Decide whether posting to a group in `group_territory` violates the
/// author's territory assignments.
///
/// Groups without a territory are global and never violate. This must be
/// re-evaluated on every create/edit; the author's assignments and the
/// group's territory can each change independently, so the result is
/// never cached.
pub fn evaluate_violation(
    author_territories: &HashSet<TerritoryId>,
    group_territory: Option<TerritoryId>,
) -> bool {
    match group_territory {
        None => false,
        Some(territory) => !author_territories.contains(&territory),
    }
}

impl Violation {
    /// Author action: ask a manager to sign off on the violation.
    pub fn request_authorization(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != ViolationStatus::Unresolved {
            return Err(DomainError::IllegalViolationTransition {
                from: self.status,
                action: "request_authorization",
            });
        }
        self.status = ViolationStatus::AuthorizationRequested;
        self.requested_at = Some(now);
        Ok(())
    }

    /// Manager action: approve the out-of-territory post.
    ///
    /// Terminal for compliance purposes; the post is allowed to stand.
    pub fn authorize(
        &mut self,
        granted_by: ProfileId,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status != ViolationStatus::AuthorizationRequested {
            return Err(DomainError::IllegalViolationTransition {
                from: self.status,
                action: "authorize",
            });
        }
        self.status = ViolationStatus::Authorized;
        self.granted_by = Some(granted_by);
        self.granted_at = Some(now);
        Ok(())
    }

    /// Manager action: refuse authorization.
    ///
    /// Not terminal: the author may still change the group, delete the
    /// post, or submit a justification.
    pub fn deny(&mut self) -> Result<(), DomainError> {
        if self.status != ViolationStatus::AuthorizationRequested {
            return Err(DomainError::IllegalViolationTransition {
                from: self.status,
                action: "deny",
            });
        }
        self.status = ViolationStatus::Denied;
        self.requested_at = None;
        Ok(())
    }

    /// Author action: record a written justification, bypassing approval.
    ///
    /// Allowed from `Unresolved` or `Denied`. Terminal for reporting: the
    /// post counts as addressed but remains a violation in aggregates.
    pub fn justify(&mut self, justification: &str) -> Result<(), DomainError> {
        if justification.trim().is_empty() {
            return Err(DomainError::EmptyJustification);
        }
        match self.status {
            ViolationStatus::Unresolved | ViolationStatus::Denied => {
                self.status = ViolationStatus::Justified;
                self.justification = Some(justification.to_string());
                Ok(())
            }
            other => Err(DomainError::IllegalViolationTransition {
                from: other,
                action: "justify",
            }),
        }
    }
}

/// A post counts as compliant once it is non-violating or its violation
/// is resolved (`Authorized` or `Justified`). `Denied` without a later
/// justification counts against, as does `Unresolved`.
pub fn is_compliant(post: &ScheduledPost) -> bool {
    match &post.violation {
        None => true,
        Some(v) => matches!(
            v.status,
            ViolationStatus::Authorized | ViolationStatus::Justified
        ),
    }
}

/// Compliance rate for a population of posts, as a percentage rounded to
/// the nearest integer. An empty population is fully compliant.
pub fn compliance_rate<'a>(posts: impl IntoIterator<Item = &'a ScheduledPost>) -> u8 {
    let mut total: u64 = 0;
    let mut compliant: u64 = 0;
    for post in posts {
        total += 1;
        if is_compliant(post) {
            compliant += 1;
        }
    }
    if total == 0 {
        return 100;
    }
    // Integer rounding to nearest: (x + d/2) / d
    ((compliant * 100 + total / 2) / total) as u8
}
