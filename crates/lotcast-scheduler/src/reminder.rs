//! The reminder run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use lotcast_core::ScheduledPost;
use lotcast_db::Store;
use lotcast_dispatch::{GenerationClient, GenerationRequest, MailClient};

use crate::error::SchedulerError;
use crate::types::{ReminderConfig, RunSummary};

/// Runs reminder passes over the store.
///
/// Safe to invoke from overlapping timers: every candidate is claimed
/// with a conditional update before any external call, so concurrent
/// runs cannot both notify for the same post.
pub struct ReminderScheduler {
    store: Arc<Store>,
    generation: GenerationClient,
    mail: MailClient,
    config: ReminderConfig,
}

impl ReminderScheduler {
    /// Create a new scheduler.
    pub fn new(
        store: Arc<Store>,
        generation: GenerationClient,
        mail: MailClient,
        config: ReminderConfig,
    ) -> Self {
        Self {
            store,
            generation,
            mail,
            config,
        }
    }

    /// Execute one reminder pass.
    ///
    /// A failed candidate query aborts the run with nothing claimed; a
    /// failed dispatch for one candidate releases that candidate's claim
    /// and moves on to the next.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<RunSummary, SchedulerError> {
        let candidates =
            self.store
                .due_candidates(now, self.config.lead_time, self.config.stale_after)?;

        let mut summary = RunSummary {
            found: candidates.len(),
            ..Default::default()
        };

        for post in candidates {
            // Claim before any external call. Losing the race means an
            // overlapping run already owns this post; not an error.
            if !self.store.claim_reminder(post.id)? {
                debug!(post_id = %post.id, "claim lost, skipping candidate");
                continue;
            }

            match self.notify(&post).await {
                Ok(()) => {
                    self.store.commit_reminder(post.id)?;
                    summary.sent += 1;
                }
                Err(e) => {
                    warn!(post_id = %post.id, error = %e, "reminder dispatch failed, releasing claim");
                    self.store.release_reminder(post.id)?;
                    summary.failed += 1;
                }
            }
        }

        info!(
            found = summary.found,
            sent = summary.sent,
            failed = summary.failed,
            "reminder run complete"
        );
        Ok(summary)
    }

    /// Prepare content (if missing) and send the notification email for
    /// one claimed candidate.
    async fn notify(&self, post: &ScheduledPost) -> Result<(), SchedulerError> {
        let author = self
            .store
            .get_profile(post.author_id)?
            .ok_or(SchedulerError::MissingAuthor(post.author_id))?;
        let group = self
            .store
            .get_group(post.group_id)?
            .ok_or(SchedulerError::MissingGroup(post.group_id))?;

        let content = if post.content.trim().is_empty() {
            let territory = match group.territory_id {
                Some(id) => self.store.get_territory(id)?.map(|t| t.name),
                None => None,
            };
            let text = self
                .generation
                .generate(&GenerationRequest {
                    group_name: group.name.clone(),
                    territory,
                    category: post.category,
                    offer_details: post.offer_details.clone(),
                    vehicle_details: post.vehicle_details.clone(),
                    testimonial: post.testimonial.clone(),
                    context: post.context.clone(),
                })
                .await?;
            self.store.save_content(post.id, &text)?;
            text
        } else {
            post.content.clone()
        };

        let subject = format!(
            "Reminder: post to {} at {}",
            group.name,
            post.scheduled_for.format("%Y-%m-%d %H:%M UTC")
        );
        let body = format!(
            "Hi {},\n\nYour post for {} is scheduled for {}. Here is the copy:\n\n{}\n",
            author.display_name,
            group.name,
            post.scheduled_for.format("%Y-%m-%d %H:%M UTC"),
            content
        );

        self.mail.send(&author.email, &subject, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lotcast_core::{FacebookGroup, PostCategory, PostStatus, Profile, Role};
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        store: Arc<Store>,
        generation_server: MockServer,
        mail_server: MockServer,
    }

    impl Fixture {
        async fn new() -> Self {
            Self {
                store: Arc::new(Store::open_in_memory().unwrap()),
                generation_server: MockServer::start().await,
                mail_server: MockServer::start().await,
            }
        }

        fn scheduler(&self, config: ReminderConfig) -> ReminderScheduler {
            ReminderScheduler::new(
                Arc::clone(&self.store),
                GenerationClient::new(self.generation_server.uri(), "gen-key"),
                MailClient::new(self.mail_server.uri(), "mail-key", "reminders@lotcast.example"),
                config,
            )
        }

        fn seed_post(&self, scheduled_for: DateTime<Utc>, content: &str) -> ScheduledPost {
            let author = Profile {
                id: Uuid::new_v4(),
                display_name: "Sam Seller".to_string(),
                email: "sam@example.com".to_string(),
                dealership_id: Uuid::new_v4(),
                role: Role::Salesperson,
                territory_ids: vec![],
                primary_territory: None,
            };
            self.store.upsert_profile(&author).unwrap();
            let group = FacebookGroup {
                id: Uuid::new_v4(),
                name: "North Deals".to_string(),
                territory_id: None,
            };
            self.store.upsert_group(&group).unwrap();
            let post = ScheduledPost::schedule(
                &author,
                &group,
                PostCategory::General,
                content.to_string(),
                scheduled_for,
                Utc::now(),
            );
            self.store.create_post(&post).unwrap();
            post
        }
    }

    async fn mount_generation_ok(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "Fresh inventory just landed!"
            })))
            .mount(server)
            .await;
    }

    async fn mount_mail_ok(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "msg-1" })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn run_generates_sends_and_commits() {
        let fx = Fixture::new().await;
        mount_generation_ok(&fx.generation_server).await;
        mount_mail_ok(&fx.mail_server).await;

        let now = Utc::now();
        let post = fx.seed_post(now + Duration::minutes(90), "");

        let scheduler = fx.scheduler(ReminderConfig::default());
        let summary = scheduler.run_once(now).await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                found: 1,
                sent: 1,
                failed: 0
            }
        );

        let loaded = fx.store.get_post(post.id).unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Ready);
        assert!(loaded.reminder_sent);
        assert_eq!(loaded.content, "Fresh inventory just landed!");
    }

    #[tokio::test]
    async fn existing_content_skips_generation() {
        let fx = Fixture::new().await;
        mount_mail_ok(&fx.mail_server).await;

        // expect(0) fails the test if generation is ever called
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&fx.generation_server)
            .await;

        let now = Utc::now();
        let post = fx.seed_post(now + Duration::minutes(30), "hand-written copy");

        let scheduler = fx.scheduler(ReminderConfig::default());
        let summary = scheduler.run_once(now).await.unwrap();
        assert_eq!(summary.sent, 1);

        let loaded = fx.store.get_post(post.id).unwrap().unwrap();
        assert_eq!(loaded.content, "hand-written copy");
    }

    #[tokio::test]
    async fn failed_send_releases_claim_and_later_run_retries() {
        let fx = Fixture::new().await;
        mount_generation_ok(&fx.generation_server).await;

        // First attempt fails, then the transport recovers
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(503).set_body_string("try later"))
            .up_to_n_times(1)
            .mount(&fx.mail_server)
            .await;
        mount_mail_ok(&fx.mail_server).await;

        let now = Utc::now();
        let post = fx.seed_post(now + Duration::minutes(30), "");

        let scheduler = fx.scheduler(ReminderConfig::default());
        let summary = scheduler.run_once(now).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.sent, 0);

        let loaded = fx.store.get_post(post.id).unwrap().unwrap();
        assert!(!loaded.reminder_sent, "claim released on failure");
        assert_eq!(loaded.status, PostStatus::Pending);

        let summary = scheduler.run_once(now).await.unwrap();
        assert_eq!(summary.sent, 1);
    }

    #[tokio::test]
    async fn one_candidate_failure_does_not_abort_the_run() {
        let fx = Fixture::new().await;
        mount_mail_ok(&fx.mail_server).await;

        // Generation fails once (for the empty-content post), succeeds after
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .up_to_n_times(1)
            .mount(&fx.generation_server)
            .await;

        let now = Utc::now();
        fx.seed_post(now + Duration::minutes(10), "");
        fx.seed_post(now + Duration::minutes(20), "already written");

        let scheduler = fx.scheduler(ReminderConfig::default());
        let summary = scheduler.run_once(now).await.unwrap();
        assert_eq!(summary.found, 2);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.failed, 1);
    }

    // Post at T+90min, lead time 120min, two poll cycles running
    // concurrently because the first is slow. Exactly one notification
    // goes out.
    #[tokio::test]
    async fn overlapping_runs_send_at_most_one_reminder() {
        let fx = Fixture::new().await;
        mount_generation_ok(&fx.generation_server).await;

        // Slow transport so both runs are in flight together; expect(1)
        // fails the test if a second send ever happens.
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "id": "msg-1" }))
                    .set_delay(std::time::Duration::from_millis(250)),
            )
            .expect(1)
            .mount(&fx.mail_server)
            .await;

        let now = Utc::now();
        let post = fx.seed_post(now + Duration::minutes(90), "ready to go");

        let scheduler = Arc::new(fx.scheduler(ReminderConfig::default()));
        let a = {
            let s = Arc::clone(&scheduler);
            tokio::spawn(async move { s.run_once(now).await.unwrap() })
        };
        let b = {
            let s = Arc::clone(&scheduler);
            tokio::spawn(async move { s.run_once(now).await.unwrap() })
        };
        let (a, b) = (a.await.unwrap(), b.await.unwrap());

        assert_eq!(a.sent + b.sent, 1, "exactly one send across both runs");

        let loaded = fx.store.get_post(post.id).unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Ready);
        assert!(loaded.reminder_sent);
    }

    #[tokio::test]
    async fn stale_posts_are_left_for_manual_handling() {
        let fx = Fixture::new().await;
        mount_generation_ok(&fx.generation_server).await;
        mount_mail_ok(&fx.mail_server).await;

        let now = Utc::now();
        fx.seed_post(now - Duration::days(3), "old copy");

        let config = ReminderConfig {
            lead_time: Duration::minutes(120),
            stale_after: Some(Duration::days(1)),
        };
        let summary = fx.scheduler(config).run_once(now).await.unwrap();
        assert_eq!(summary, RunSummary::default());
    }
}
