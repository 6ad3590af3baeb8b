//! SQLite store implementation.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;
use uuid::Uuid;

use lotcast_core::{
    FacebookGroup, PostCategory, PostId, PostStatus, Profile, ProfileId, Role, ScheduledPost,
    Territory, TerritoryId, Violation, ViolationStatus,
};

use crate::error::StoreError;

/// Which posts a listing query should return.
#[derive(Debug, Clone, Copy)]
pub enum PostScope {
    /// Posts authored by one profile.
    Author(ProfileId),
    /// Posts authored by anyone in one dealership.
    Dealership(Uuid),
    /// Everything (organization owners).
    All,
}

/// SQLite-backed store for posts and directory data.
pub struct Store {
    conn: Mutex<Connection>,
}

/// Fixed-width UTC timestamp so lexicographic comparison in SQL matches
/// chronological order.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {s:?}: {e}")))
}

fn parse_id(s: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(s).map_err(|e| StoreError::Corrupt(format!("bad uuid {s:?}: {e}")))
}

impl Store {
    /// Open or create the SQLite database.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self::init(conn)?;
        info!(path = %path, "post database initialized");
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        // WAL for concurrent reads
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS territories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL,
                dealership_id TEXT NOT NULL,
                role TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS profile_territories (
                profile_id TEXT NOT NULL REFERENCES profiles(id),
                territory_id TEXT NOT NULL REFERENCES territories(id),
                is_primary INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (profile_id, territory_id)
            );

            CREATE TABLE IF NOT EXISTS facebook_groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                territory_id TEXT REFERENCES territories(id)
            );

            CREATE TABLE IF NOT EXISTS scheduled_posts (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL REFERENCES profiles(id),
                group_id TEXT NOT NULL REFERENCES facebook_groups(id),
                territory_id TEXT,
                content TEXT NOT NULL DEFAULT '',
                category TEXT NOT NULL DEFAULT 'general',
                offer_details TEXT,
                vehicle_details TEXT,
                testimonial TEXT,
                context TEXT,
                scheduled_for TEXT NOT NULL,
                created_at TEXT NOT NULL,
                posted_at TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                reminder_sent INTEGER NOT NULL DEFAULT 0,
                territory_violation INTEGER NOT NULL DEFAULT 0,
                violation_status TEXT,
                violation_justification TEXT,
                authorization_requested_at TEXT,
                authorization_granted_by TEXT,
                authorization_granted_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_posts_due
                ON scheduled_posts(scheduled_for, status, reminder_sent);
            CREATE INDEX IF NOT EXISTS idx_posts_author
                ON scheduled_posts(author_id);
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // =========================================================================
    // Directory: territories, profiles, groups
    // =========================================================================

    /// Insert or update a territory.
    pub fn upsert_territory(&self, territory: &Territory) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO territories (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![territory.id.to_string(), territory.name],
        )?;
        Ok(())
    }

    /// Insert or update a Facebook group.
    pub fn upsert_group(&self, group: &FacebookGroup) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO facebook_groups (id, name, territory_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                territory_id = excluded.territory_id",
            params![
                group.id.to_string(),
                group.name,
                group.territory_id.map(|t| t.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Insert or update a profile and its territory assignments.
    pub fn upsert_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO profiles (id, display_name, email, dealership_id, role)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email,
                dealership_id = excluded.dealership_id,
                role = excluded.role",
            params![
                profile.id.to_string(),
                profile.display_name,
                profile.email,
                profile.dealership_id.to_string(),
                profile.role.as_str(),
            ],
        )?;
        tx.execute(
            "DELETE FROM profile_territories WHERE profile_id = ?1",
            params![profile.id.to_string()],
        )?;
        for territory_id in &profile.territory_ids {
            let primary = profile.primary_territory == Some(*territory_id);
            tx.execute(
                "INSERT INTO profile_territories (profile_id, territory_id, is_primary)
                 VALUES (?1, ?2, ?3)",
                params![
                    profile.id.to_string(),
                    territory_id.to_string(),
                    primary as i64,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Fetch a profile with its territory assignments.
    pub fn get_profile(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, String, String)> = conn
            .query_row(
                "SELECT display_name, email, dealership_id, role
                 FROM profiles WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                    ))
                },
            )
            .optional()?;
        let Some((display_name, email, dealership_id, role)) = row else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT territory_id, is_primary FROM profile_territories WHERE profile_id = ?1",
        )?;
        let assignments: Vec<(String, i64)> = stmt
            .query_map(params![id.to_string()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<Result<_, _>>()?;

        let mut territory_ids = Vec::with_capacity(assignments.len());
        let mut primary_territory = None;
        for (territory, is_primary) in assignments {
            let territory = parse_id(&territory)?;
            territory_ids.push(territory);
            if is_primary != 0 {
                primary_territory = Some(territory);
            }
        }

        Ok(Some(Profile {
            id,
            display_name,
            email,
            dealership_id: parse_id(&dealership_id)?,
            role: Role::parse(&role)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown role {role:?}")))?,
            territory_ids,
            primary_territory,
        }))
    }

    /// Fetch a Facebook group.
    pub fn get_group(&self, id: Uuid) -> Result<Option<FacebookGroup>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, Option<String>)> = conn
            .query_row(
                "SELECT name, territory_id FROM facebook_groups WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((name, territory_id)) = row else {
            return Ok(None);
        };
        Ok(Some(FacebookGroup {
            id,
            name,
            territory_id: territory_id.as_deref().map(parse_id).transpose()?,
        }))
    }

    /// Fetch a territory.
    pub fn get_territory(&self, id: TerritoryId) -> Result<Option<Territory>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let name: Option<String> = conn
            .query_row(
                "SELECT name FROM territories WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.map(|name| Territory { id, name }))
    }

    // =========================================================================
    // Scheduled posts
    // =========================================================================

    /// Insert a freshly scheduled post.
    pub fn create_post(&self, post: &ScheduledPost) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let v = post.violation.as_ref();
        conn.execute(
            "INSERT INTO scheduled_posts (
                id, author_id, group_id, territory_id, content, category,
                offer_details, vehicle_details, testimonial, context,
                scheduled_for, created_at, posted_at, status, reminder_sent,
                territory_violation, violation_status, violation_justification,
                authorization_requested_at, authorization_granted_by,
                authorization_granted_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                      ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            params![
                post.id.to_string(),
                post.author_id.to_string(),
                post.group_id.to_string(),
                post.territory_id.map(|t| t.to_string()),
                post.content,
                post.category.as_str(),
                post.offer_details,
                post.vehicle_details,
                post.testimonial,
                post.context,
                ts(post.scheduled_for),
                ts(post.created_at),
                post.posted_at.map(ts),
                post.status.as_str(),
                post.reminder_sent as i64,
                v.is_some() as i64,
                v.map(|v| v.status.as_str()),
                v.and_then(|v| v.justification.clone()),
                v.and_then(|v| v.requested_at).map(ts),
                v.and_then(|v| v.granted_by).map(|p| p.to_string()),
                v.and_then(|v| v.granted_at).map(ts),
            ],
        )?;
        Ok(())
    }

    /// Persist a mutation made through the domain state machines.
    ///
    /// Deliberately never writes `reminder_sent`: that flag only moves
    /// through [`Store::claim_reminder`] and [`Store::release_reminder`],
    /// which keeps it monotonic under concurrent scheduler runs.
    pub fn update_post(&self, post: &ScheduledPost) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let v = post.violation.as_ref();
        conn.execute(
            "UPDATE scheduled_posts SET
                group_id = ?2,
                territory_id = ?3,
                content = ?4,
                category = ?5,
                offer_details = ?6,
                vehicle_details = ?7,
                testimonial = ?8,
                context = ?9,
                scheduled_for = ?10,
                posted_at = ?11,
                status = ?12,
                territory_violation = ?13,
                violation_status = ?14,
                violation_justification = ?15,
                authorization_requested_at = ?16,
                authorization_granted_by = ?17,
                authorization_granted_at = ?18
             WHERE id = ?1",
            params![
                post.id.to_string(),
                post.group_id.to_string(),
                post.territory_id.map(|t| t.to_string()),
                post.content,
                post.category.as_str(),
                post.offer_details,
                post.vehicle_details,
                post.testimonial,
                post.context,
                ts(post.scheduled_for),
                post.posted_at.map(ts),
                post.status.as_str(),
                v.is_some() as i64,
                v.map(|v| v.status.as_str()),
                v.and_then(|v| v.justification.clone()),
                v.and_then(|v| v.requested_at).map(ts),
                v.and_then(|v| v.granted_by).map(|p| p.to_string()),
                v.and_then(|v| v.granted_at).map(ts),
            ],
        )?;
        Ok(())
    }

    /// Fetch one post.
    pub fn get_post(&self, id: PostId) -> Result<Option<ScheduledPost>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("{POST_SELECT} WHERE id = ?1"),
                params![id.to_string()],
                raw_post,
            )
            .optional()?;
        row.map(RawPost::into_post).transpose()
    }

    /// Hard-delete a post. Returns false if it did not exist.
    pub fn delete_post(&self, id: PostId) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "DELETE FROM scheduled_posts WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected == 1)
    }

    /// List posts visible within a scope, soonest first.
    pub fn list_posts(&self, scope: PostScope) -> Result<Vec<ScheduledPost>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let (sql, param): (String, Option<String>) = match scope {
            PostScope::Author(author) => (
                format!("{POST_SELECT} WHERE author_id = ?1 ORDER BY scheduled_for"),
                Some(author.to_string()),
            ),
            PostScope::Dealership(dealership) => (
                format!(
                    "{POST_SELECT} WHERE author_id IN
                        (SELECT id FROM profiles WHERE dealership_id = ?1)
                     ORDER BY scheduled_for"
                ),
                Some(dealership.to_string()),
            ),
            PostScope::All => (format!("{POST_SELECT} ORDER BY scheduled_for"), None),
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<RawPost> = match param {
            Some(p) => stmt
                .query_map(params![p], raw_post)?
                .collect::<Result<_, _>>()?,
            None => stmt.query_map([], raw_post)?.collect::<Result<_, _>>()?,
        };
        rows.into_iter().map(RawPost::into_post).collect()
    }

    // =========================================================================
    // Reminder window and claim
    // =========================================================================

    /// Posts due for a reminder: `scheduled_for` before `now + lead_time`
    /// (exclusive upper bound), status pending or ready, reminder not yet
    /// sent. Posts already past due stay eligible, unless older than the
    /// optional staleness cutoff.
    pub fn due_candidates(
        &self,
        now: DateTime<Utc>,
        lead_time: Duration,
        stale_after: Option<Duration>,
    ) -> Result<Vec<ScheduledPost>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let upper = ts(now + lead_time);
        let lower = stale_after.map(|cutoff| ts(now - cutoff));

        let sql = format!(
            "{POST_SELECT}
             WHERE scheduled_for < ?1
               AND (?2 IS NULL OR scheduled_for >= ?2)
               AND status IN ('pending', 'ready')
               AND reminder_sent = 0
             ORDER BY scheduled_for"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows: Vec<RawPost> = stmt
            .query_map(params![upper, lower], raw_post)?
            .collect::<Result<_, _>>()?;
        rows.into_iter().map(RawPost::into_post).collect()
    }

    /// Atomically claim the right to send this post's reminder.
    ///
    /// Single conditional write: set the flag only where it is still
    /// unset, then check the affected-row count. Exactly one invocation
    /// wins even when scheduler runs overlap; losers get `false` and must
    /// skip the candidate.
    pub fn claim_reminder(&self, id: PostId) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE scheduled_posts SET reminder_sent = 1
             WHERE id = ?1 AND reminder_sent = 0 AND status IN ('pending', 'ready')",
            params![id.to_string()],
        )?;
        Ok(affected == 1)
    }

    /// Release a claim after a failed dispatch so a later run retries.
    /// Only the claim winner may call this.
    pub fn release_reminder(&self, id: PostId) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE scheduled_posts SET reminder_sent = 0
             WHERE id = ?1 AND reminder_sent = 1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    /// Commit a successful reminder: the post becomes ready. The flag was
    /// already set by the claim.
    pub fn commit_reminder(&self, id: PostId) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE scheduled_posts SET status = 'ready'
             WHERE id = ?1 AND reminder_sent = 1 AND status = 'pending'",
            params![id.to_string()],
        )?;
        Ok(())
    }

    /// Persist generated content for a claimed post without touching any
    /// other field.
    pub fn save_content(&self, id: PostId, content: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE scheduled_posts SET content = ?2 WHERE id = ?1",
            params![id.to_string(), content],
        )?;
        Ok(())
    }
}

const POST_SELECT: &str = "SELECT
    id, author_id, group_id, territory_id, content, category,
    offer_details, vehicle_details, testimonial, context,
    scheduled_for, created_at, posted_at, status, reminder_sent,
    territory_violation, violation_status, violation_justification,
    authorization_requested_at, authorization_granted_by,
    authorization_granted_at
 FROM scheduled_posts";

/// Raw row shape before domain conversion.
struct RawPost {
    id: String,
    author_id: String,
    group_id: String,
    territory_id: Option<String>,
    content: String,
    category: String,
    offer_details: Option<String>,
    vehicle_details: Option<String>,
    testimonial: Option<String>,
    context: Option<String>,
    scheduled_for: String,
    created_at: String,
    posted_at: Option<String>,
    status: String,
    reminder_sent: i64,
    territory_violation: i64,
    violation_status: Option<String>,
    violation_justification: Option<String>,
    authorization_requested_at: Option<String>,
    authorization_granted_by: Option<String>,
    authorization_granted_at: Option<String>,
}

fn raw_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPost> {
    Ok(RawPost {
        id: row.get(0)?,
        author_id: row.get(1)?,
        group_id: row.get(2)?,
        territory_id: row.get(3)?,
        content: row.get(4)?,
        category: row.get(5)?,
        offer_details: row.get(6)?,
        vehicle_details: row.get(7)?,
        testimonial: row.get(8)?,
        context: row.get(9)?,
        scheduled_for: row.get(10)?,
        created_at: row.get(11)?,
        posted_at: row.get(12)?,
        status: row.get(13)?,
        reminder_sent: row.get(14)?,
        territory_violation: row.get(15)?,
        violation_status: row.get(16)?,
        violation_justification: row.get(17)?,
        authorization_requested_at: row.get(18)?,
        authorization_granted_by: row.get(19)?,
        authorization_granted_at: row.get(20)?,
    })
}

impl RawPost {
    fn into_post(self) -> Result<ScheduledPost, StoreError> {
        let violation = if self.territory_violation != 0 {
            let status = match self.violation_status.as_deref() {
                Some(s) => ViolationStatus::parse(s)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown violation status {s:?}")))?,
                None => ViolationStatus::Unresolved,
            };
            Some(Violation {
                status,
                justification: self.violation_justification,
                requested_at: self
                    .authorization_requested_at
                    .as_deref()
                    .map(parse_ts)
                    .transpose()?,
                granted_by: self
                    .authorization_granted_by
                    .as_deref()
                    .map(parse_id)
                    .transpose()?,
                granted_at: self
                    .authorization_granted_at
                    .as_deref()
                    .map(parse_ts)
                    .transpose()?,
            })
        } else {
            None
        };

        Ok(ScheduledPost {
            id: parse_id(&self.id)?,
            author_id: parse_id(&self.author_id)?,
            group_id: parse_id(&self.group_id)?,
            territory_id: self.territory_id.as_deref().map(parse_id).transpose()?,
            content: self.content,
            category: PostCategory::parse(&self.category)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown category {:?}", self.category)))?,
            offer_details: self.offer_details,
            vehicle_details: self.vehicle_details,
            testimonial: self.testimonial,
            context: self.context,
            scheduled_for: parse_ts(&self.scheduled_for)?,
            created_at: parse_ts(&self.created_at)?,
            posted_at: self.posted_at.as_deref().map(parse_ts).transpose()?,
            status: PostStatus::parse(&self.status)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown status {:?}", self.status)))?,
            reminder_sent: self.reminder_sent != 0,
            violation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lotcast_core::PostCategory;
    use pretty_assertions::assert_eq;

    fn store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn seed_author(store: &Store, territories: Vec<TerritoryId>) -> Profile {
        let profile = Profile {
            id: Uuid::new_v4(),
            display_name: "Sam Seller".to_string(),
            email: "sam@example.com".to_string(),
            dealership_id: Uuid::new_v4(),
            role: Role::Salesperson,
            primary_territory: territories.first().copied(),
            territory_ids: territories,
        };
        store.upsert_profile(&profile).unwrap();
        profile
    }

    fn seed_group(store: &Store, territory_id: Option<TerritoryId>) -> FacebookGroup {
        let group = FacebookGroup {
            id: Uuid::new_v4(),
            name: "North Deals".to_string(),
            territory_id,
        };
        store.upsert_group(&group).unwrap();
        group
    }

    fn schedule_at(store: &Store, at: DateTime<Utc>) -> ScheduledPost {
        let author = seed_author(store, vec![]);
        let group = seed_group(store, None);
        let post = ScheduledPost::schedule(
            &author,
            &group,
            PostCategory::General,
            "draft copy".to_string(),
            at,
            Utc::now(),
        );
        store.create_post(&post).unwrap();
        post
    }

    #[test]
    fn post_round_trips_including_violation() {
        let store = store();
        let home = Uuid::new_v4();
        let away = Uuid::new_v4();
        let author = seed_author(&store, vec![home]);
        let group = seed_group(&store, Some(away));

        let mut post = ScheduledPost::schedule(
            &author,
            &group,
            PostCategory::Offer,
            String::new(),
            Utc::now() + Duration::hours(1),
            Utc::now(),
        );
        post.offer_details = Some("0% APR through Sunday".to_string());
        store.create_post(&post).unwrap();

        let loaded = store.get_post(post.id).unwrap().expect("post exists");
        assert_eq!(loaded.author_id, author.id);
        assert_eq!(loaded.territory_id, Some(away));
        assert_eq!(loaded.offer_details.as_deref(), Some("0% APR through Sunday"));
        let v = loaded.violation.expect("violation persisted");
        assert_eq!(v.status, ViolationStatus::Unresolved);
    }

    #[test]
    fn profile_round_trips_with_primary_territory() {
        let store = store();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();
        let profile = Profile {
            id: Uuid::new_v4(),
            display_name: "Pat".to_string(),
            email: "pat@example.com".to_string(),
            dealership_id: Uuid::new_v4(),
            role: Role::Manager,
            territory_ids: vec![t1, t2],
            primary_territory: Some(t2),
        };
        store.upsert_profile(&profile).unwrap();

        let loaded = store.get_profile(profile.id).unwrap().unwrap();
        assert_eq!(loaded.primary_territory, Some(t2));
        assert_eq!(loaded.territory_set(), profile.territory_set());
        assert_eq!(loaded.role, Role::Manager);
    }

    #[test]
    fn claim_is_won_exactly_once() {
        let store = store();
        let post = schedule_at(&store, Utc::now() + Duration::minutes(10));

        assert!(store.claim_reminder(post.id).unwrap());
        // A second (overlapping) run loses the race
        assert!(!store.claim_reminder(post.id).unwrap());
    }

    #[test]
    fn released_claim_can_be_won_again() {
        let store = store();
        let post = schedule_at(&store, Utc::now() + Duration::minutes(10));

        assert!(store.claim_reminder(post.id).unwrap());
        store.release_reminder(post.id).unwrap();
        assert!(store.claim_reminder(post.id).unwrap());
    }

    #[test]
    fn committed_reminder_is_never_reclaimed() {
        let store = store();
        let post = schedule_at(&store, Utc::now() + Duration::minutes(10));

        assert!(store.claim_reminder(post.id).unwrap());
        store.commit_reminder(post.id).unwrap();

        let loaded = store.get_post(post.id).unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Ready);
        assert!(loaded.reminder_sent);
        assert!(!store.claim_reminder(post.id).unwrap());
    }

    #[test]
    fn update_post_does_not_touch_reminder_flag() {
        let store = store();
        let mut post = schedule_at(&store, Utc::now() + Duration::minutes(10));
        assert!(store.claim_reminder(post.id).unwrap());

        // A concurrent author edit carries a stale reminder_sent = false
        post.content = "edited copy".to_string();
        store.update_post(&post).unwrap();

        let loaded = store.get_post(post.id).unwrap().unwrap();
        assert_eq!(loaded.content, "edited copy");
        assert!(loaded.reminder_sent, "flag must stay set");
    }

    #[test]
    fn window_is_half_open() {
        let store = store();
        let now = Utc::now();
        let lead = Duration::minutes(120);

        let due_now = schedule_at(&store, now);
        let inside = schedule_at(&store, now + lead - Duration::seconds(1));
        let boundary = schedule_at(&store, now + lead);
        let past_due = schedule_at(&store, now - Duration::hours(3));

        let candidates = store.due_candidates(now, lead, None).unwrap();
        let ids: Vec<PostId> = candidates.iter().map(|p| p.id).collect();

        assert!(ids.contains(&due_now.id), "lower bound is inclusive");
        assert!(ids.contains(&inside.id));
        assert!(!ids.contains(&boundary.id), "upper bound is exclusive");
        assert!(ids.contains(&past_due.id), "late posts get one send");
    }

    #[test]
    fn stale_cutoff_excludes_very_old_posts() {
        let store = store();
        let now = Utc::now();
        let lead = Duration::minutes(120);

        let fresh = schedule_at(&store, now - Duration::hours(2));
        let stale = schedule_at(&store, now - Duration::days(2));

        let candidates = store
            .due_candidates(now, lead, Some(Duration::days(1)))
            .unwrap();
        let ids: Vec<PostId> = candidates.iter().map(|p| p.id).collect();
        assert!(ids.contains(&fresh.id));
        assert!(!ids.contains(&stale.id));

        // No cutoff configured: everything stays eligible
        let candidates = store.due_candidates(now, lead, None).unwrap();
        let ids: Vec<PostId> = candidates.iter().map(|p| p.id).collect();
        assert!(ids.contains(&stale.id));
    }

    #[test]
    fn posted_and_sent_posts_are_not_candidates() {
        let store = store();
        let now = Utc::now();

        let mut posted = schedule_at(&store, now + Duration::minutes(5));
        posted.mark_posted(now).unwrap();
        store.update_post(&posted).unwrap();

        let claimed = schedule_at(&store, now + Duration::minutes(5));
        assert!(store.claim_reminder(claimed.id).unwrap());

        let candidates = store
            .due_candidates(now, Duration::minutes(120), None)
            .unwrap();
        let ids: Vec<PostId> = candidates.iter().map(|p| p.id).collect();
        assert!(!ids.contains(&posted.id));
        assert!(!ids.contains(&claimed.id));
    }

    #[test]
    fn deleted_post_is_gone() {
        let store = store();
        let post = schedule_at(&store, Utc::now());
        assert!(store.delete_post(post.id).unwrap());
        assert!(store.get_post(post.id).unwrap().is_none());
        assert!(!store.delete_post(post.id).unwrap());
    }

    #[test]
    fn dealership_scope_joins_through_profiles() {
        let store = store();
        let dealership = Uuid::new_v4();

        let mut author_a = seed_author(&store, vec![]);
        author_a.dealership_id = dealership;
        store.upsert_profile(&author_a).unwrap();
        let mut author_b = seed_author(&store, vec![]);
        author_b.dealership_id = dealership;
        store.upsert_profile(&author_b).unwrap();
        let outsider = seed_author(&store, vec![]);

        let group = seed_group(&store, None);
        for author in [&author_a, &author_b, &outsider] {
            let post = ScheduledPost::schedule(
                author,
                &group,
                PostCategory::General,
                String::new(),
                Utc::now(),
                Utc::now(),
            );
            store.create_post(&post).unwrap();
        }

        let posts = store.list_posts(PostScope::Dealership(dealership)).unwrap();
        assert_eq!(posts.len(), 2);
        assert!(posts.iter().all(|p| p.author_id != outsider.id));

        let all = store.list_posts(PostScope::All).unwrap();
        assert_eq!(all.len(), 3);

        let mine = store.list_posts(PostScope::Author(author_a.id)).unwrap();
        assert_eq!(mine.len(), 1);
    }
}
