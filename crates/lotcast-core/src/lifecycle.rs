//! Post lifecycle state machine.
//!
//! Status transitions are validated here on every mutation; callers never
//! infer state from field combinations.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::compliance::evaluate_violation;
use crate::error::DomainError;
use crate::types::{
    FacebookGroup, PostCategory, PostStatus, Principal, Profile, Role, ScheduledPost, TerritoryId,
    Violation,
};

impl ScheduledPost {
    /// Schedule a new post. Violation detection runs immediately against
    /// the author's full territory set.
    pub fn schedule(
        author: &Profile,
        group: &FacebookGroup,
        category: PostCategory,
        content: String,
        scheduled_for: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let violating = evaluate_violation(&author.territory_set(), group.territory_id);
        Self {
            id: Uuid::new_v4(),
            author_id: author.id,
            group_id: group.id,
            territory_id: group.territory_id,
            content,
            category,
            offer_details: None,
            vehicle_details: None,
            testimonial: None,
            context: None,
            scheduled_for,
            created_at: now,
            posted_at: None,
            status: PostStatus::Pending,
            reminder_sent: false,
            violation: violating.then(Violation::default),
        }
    }

    /// Whether the scheduled time has passed without publication.
    ///
    /// Derived view for display and filtering only; it gates no
    /// transition.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_for < now && self.status != PostStatus::Posted
    }

    /// Content, timing, and group edits are allowed in `Pending` and
    /// `Ready` only.
    pub fn ensure_editable(&self) -> Result<(), DomainError> {
        match self.status {
            PostStatus::Pending | PostStatus::Ready => Ok(()),
            other => Err(DomainError::NotEditable(other)),
        }
    }

    /// Deletion is allowed from any state except `Posted`.
    pub fn ensure_deletable(&self) -> Result<(), DomainError> {
        if self.status == PostStatus::Posted {
            return Err(DomainError::DeletePosted);
        }
        Ok(())
    }

    /// Scheduler transition: content prepared and notification sent.
    ///
    /// Idempotent: a post already `Ready` stays `Ready` so overlapping
    /// scheduler runs are harmless.
    pub fn mark_ready(&mut self) -> Result<(), DomainError> {
        match self.status {
            PostStatus::Pending => {
                self.status = PostStatus::Ready;
                Ok(())
            }
            PostStatus::Ready => Ok(()),
            other => Err(DomainError::IllegalStatusTransition {
                from: other,
                to: PostStatus::Ready,
            }),
        }
    }

    /// Author confirmed publication. Independent of whether a reminder
    /// fired; a delivery failure does not block it either.
    pub fn mark_posted(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        match self.status {
            PostStatus::Pending | PostStatus::Ready | PostStatus::Failed => {
                self.status = PostStatus::Posted;
                self.posted_at = Some(now);
                Ok(())
            }
            other => Err(DomainError::IllegalStatusTransition {
                from: other,
                to: PostStatus::Posted,
            }),
        }
    }

    /// Mark the notification pipeline as failed for this post.
    pub fn mark_failed(&mut self) -> Result<(), DomainError> {
        match self.status {
            PostStatus::Pending | PostStatus::Ready => {
                self.status = PostStatus::Failed;
                Ok(())
            }
            other => Err(DomainError::IllegalStatusTransition {
                from: other,
                to: PostStatus::Failed,
            }),
        }
    }

    /// Retarget the post at a (possibly different) group and re-run
    /// violation detection against the author's current territory set.
    ///
    /// Selecting an in-territory or global group deletes the violation
    /// record entirely. Switching to a different violating group starts a
    /// fresh `Unresolved` violation; any resolution earned against the
    /// old group does not carry over.
    pub fn retarget(
        &mut self,
        group: &FacebookGroup,
        author_territories: &HashSet<TerritoryId>,
    ) -> Result<(), DomainError> {
        self.ensure_editable()?;

        let group_changed = self.group_id != group.id;
        self.group_id = group.id;
        self.territory_id = group.territory_id;

        if evaluate_violation(author_territories, group.territory_id) {
            if group_changed || self.violation.is_none() {
                self.violation = Some(Violation::default());
            }
        } else {
            self.violation = None;
        }
        Ok(())
    }
}

/// Visibility rule: authors see their own posts, managers see posts from
/// their dealership, owners see everything.
pub fn can_view_post(principal: &Principal, author: &Profile) -> bool {
    match principal.role {
        Role::Owner => true,
        Role::Manager => principal.dealership_id == author.dealership_id,
        Role::Salesperson => principal.profile_id == author.id,
    }
}

/// Edit ownership: only the author may edit, delete, justify, or mark a
/// post as posted.
pub fn is_author(principal: &Principal, post: &ScheduledPost) -> bool {
    principal.profile_id == post.author_id
}
