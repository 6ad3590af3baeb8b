//! Core entity types.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a scheduled post.
pub type PostId = Uuid;
/// Identifier of a salesperson/manager/owner profile.
pub type ProfileId = Uuid;
/// Identifier of a Facebook group.
pub type GroupId = Uuid;
/// Identifier of a sales territory.
pub type TerritoryId = Uuid;

/// Lifecycle status of a scheduled post.
///
/// Deletion is a hard row removal, not a status; `overdue` is a derived
/// view computed from `scheduled_for`, not stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Scheduled by the author, no reminder fired yet.
    #[default]
    Pending,
    /// Content prepared and the reminder notification went out.
    Ready,
    /// The author confirmed publication.
    Posted,
    /// The notification pipeline failed for this post. Does not block the
    /// author from still marking it posted.
    Failed,
}

impl PostStatus {
    /// Stable string form, used for SQLite storage.
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Ready => "ready",
            PostStatus::Posted => "posted",
            PostStatus::Failed => "failed",
        }
    }

    /// Parse the storage form back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PostStatus::Pending),
            "ready" => Some(PostStatus::Ready),
            "posted" => Some(PostStatus::Posted),
            "failed" => Some(PostStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of copy the generation service should produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostCategory {
    /// A sales offer or promotion.
    Offer,
    /// A specific vehicle listing.
    Vehicle,
    /// A customer testimonial.
    Testimonial,
    /// Anything else.
    #[default]
    General,
}

impl PostCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            PostCategory::Offer => "offer",
            PostCategory::Vehicle => "vehicle",
            PostCategory::Testimonial => "testimonial",
            PostCategory::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "offer" => Some(PostCategory::Offer),
            "vehicle" => Some(PostCategory::Vehicle),
            "testimonial" => Some(PostCategory::Testimonial),
            "general" => Some(PostCategory::General),
            _ => None,
        }
    }
}

impl fmt::Display for PostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolution state of a territory violation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationStatus {
    /// Flagged, nobody has acted on it.
    #[default]
    Unresolved,
    /// The author asked a manager for sign-off.
    AuthorizationRequested,
    /// A manager approved the out-of-territory post.
    Authorized,
    /// A manager refused; the author can still edit, delete, or justify.
    Denied,
    /// The author supplied a written justification instead of approval.
    Justified,
}

impl ViolationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationStatus::Unresolved => "unresolved",
            ViolationStatus::AuthorizationRequested => "authorization_requested",
            ViolationStatus::Authorized => "authorized",
            ViolationStatus::Denied => "denied",
            ViolationStatus::Justified => "justified",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unresolved" => Some(ViolationStatus::Unresolved),
            "authorization_requested" => Some(ViolationStatus::AuthorizationRequested),
            "authorized" => Some(ViolationStatus::Authorized),
            "denied" => Some(ViolationStatus::Denied),
            "justified" => Some(ViolationStatus::Justified),
            _ => None,
        }
    }
}

impl fmt::Display for ViolationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A flagged territory violation and its resolution state.
///
/// Present on a post if and only if the target group's territory is not
/// among the author's assigned territories. The authorization fields are
/// only ever set by the transitions in the compliance module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub status: ViolationStatus,
    /// Free-text justification supplied by the author.
    pub justification: Option<String>,
    /// When the author requested authorization. Cleared on denial.
    pub requested_at: Option<DateTime<Utc>>,
    /// Manager who granted authorization.
    pub granted_by: Option<ProfileId>,
    /// When authorization was granted.
    pub granted_at: Option<DateTime<Utc>>,
}

/// A post scheduled for a Facebook group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: PostId,
    /// The salesperson who scheduled it. Exclusive edit owner.
    pub author_id: ProfileId,
    pub group_id: GroupId,
    /// The group's territory as captured at schedule time.
    pub territory_id: Option<TerritoryId>,
    /// Post copy. Empty until the generation service fills it in or the
    /// author writes their own.
    pub content: String,
    pub category: PostCategory,
    /// Structured prompt parameters for the generation service.
    pub offer_details: Option<String>,
    pub vehicle_details: Option<String>,
    pub testimonial: Option<String>,
    pub context: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Set if and only if status is `Posted`.
    pub posted_at: Option<DateTime<Utc>>,
    pub status: PostStatus,
    /// Whether the one reminder for this post has been sent. Only ever
    /// transitions false -> true.
    pub reminder_sent: bool,
    /// Present iff the post violates territory compliance.
    pub violation: Option<Violation>,
}

/// Role of a profile within the dealer network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Salesperson,
    Manager,
    Owner,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Salesperson => "salesperson",
            Role::Manager => "manager",
            Role::Owner => "owner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "salesperson" => Some(Role::Salesperson),
            "manager" => Some(Role::Manager),
            "owner" => Some(Role::Owner),
            _ => None,
        }
    }
}

/// A salesperson, manager, or organization owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub display_name: String,
    /// Where reminder emails go.
    pub email: String,
    pub dealership_id: Uuid,
    pub role: Role,
    /// All assigned territories, not just the primary.
    pub territory_ids: Vec<TerritoryId>,
    /// At most one assigned territory may be marked primary.
    pub primary_territory: Option<TerritoryId>,
}

impl Profile {
    /// The territory set used for violation checks.
    pub fn territory_set(&self) -> HashSet<TerritoryId> {
        self.territory_ids.iter().copied().collect()
    }
}

/// A target Facebook group. Groups without a territory are global and
/// never cause a violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacebookGroup {
    pub id: GroupId,
    pub name: String,
    pub territory_id: Option<TerritoryId>,
}

/// A named sales region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryId,
    pub name: String,
}

/// The authenticated caller of an operation.
///
/// Passed explicitly through every operation instead of living in an
/// ambient/module-level context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub profile_id: ProfileId,
    pub dealership_id: Uuid,
    pub role: Role,
}

impl Principal {
    /// Whether this caller may decide authorization requests for a post
    /// authored within the given dealership.
    pub fn can_decide_authorization(&self, author_dealership: Uuid) -> bool {
        match self.role {
            Role::Owner => true,
            Role::Manager => self.dealership_id == author_dealership,
            Role::Salesperson => false,
        }
    }
}
