//! API routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use lotcast_core::{
    DomainError, PostCategory, Role, ScheduledPost, ViolationStatus, can_view_post,
    compliance_rate, is_author,
};
use lotcast_db::{PostScope, Store};
use lotcast_scheduler::{ReminderScheduler, RunSummary};

use crate::error::ApiError;
use crate::principal::{require_principal, require_trigger_token};

/// Shared state for the API server.
pub struct AppState {
    pub store: Arc<Store>,
    pub scheduler: Arc<ReminderScheduler>,
    /// Shared secret for the reminder trigger endpoint. `None` means the
    /// endpoint answers 500 until it is configured.
    pub trigger_token: Option<String>,
}

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Posts
        .route("/api/posts", post(create_post).get(list_posts))
        .route("/api/posts/{id}", get(get_post).post(edit_post))
        .route("/api/posts/{id}/delete", post(delete_post))
        .route("/api/posts/{id}/posted", post(mark_posted))
        // Violation resolution
        .route(
            "/api/posts/{id}/request-authorization",
            post(request_authorization),
        )
        .route("/api/posts/{id}/authorize", post(authorize))
        .route("/api/posts/{id}/deny", post(deny))
        .route("/api/posts/{id}/justify", post(justify))
        // Reporting
        .route("/api/compliance/report", get(compliance_report))
        // Reminder trigger (external timer)
        .route("/api/reminders/run", post(run_reminders))
        // Other
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// A post as returned by the API: the stored record plus the derived
/// `overdue` view.
#[derive(Debug, Serialize)]
struct PostView {
    #[serde(flatten)]
    post: ScheduledPost,
    overdue: bool,
}

impl PostView {
    fn new(post: ScheduledPost, now: DateTime<Utc>) -> Self {
        let overdue = post.is_overdue(now);
        Self { post, overdue }
    }
}

#[derive(Debug, Deserialize)]
struct CreatePostRequest {
    group_id: Uuid,
    scheduled_for: DateTime<Utc>,
    #[serde(default)]
    category: PostCategory,
    #[serde(default)]
    content: String,
    offer_details: Option<String>,
    vehicle_details: Option<String>,
    testimonial: Option<String>,
    context: Option<String>,
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (_, author) = require_principal(&state.store, &headers)?;
    let group = state
        .store
        .get_group(body.group_id)?
        .ok_or_else(|| ApiError::Invalid("unknown group".to_string()))?;

    let now = Utc::now();
    let mut post = ScheduledPost::schedule(
        &author,
        &group,
        body.category,
        body.content,
        body.scheduled_for,
        now,
    );
    post.offer_details = body.offer_details;
    post.vehicle_details = body.vehicle_details;
    post.testimonial = body.testimonial;
    post.context = body.context;

    state.store.create_post(&post)?;
    Ok((StatusCode::CREATED, Json(PostView::new(post, now))))
}

async fn list_posts(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let (principal, _) = require_principal(&state.store, &headers)?;
    let scope = match principal.role {
        Role::Salesperson => PostScope::Author(principal.profile_id),
        Role::Manager => PostScope::Dealership(principal.dealership_id),
        Role::Owner => PostScope::All,
    };
    let now = Utc::now();
    let posts = state.store.list_posts(scope)?;
    Ok(Json(
        posts.into_iter().map(|p| PostView::new(p, now)).collect(),
    ))
}

async fn get_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<PostView>, ApiError> {
    let (principal, _) = require_principal(&state.store, &headers)?;
    let post = state.store.get_post(id)?.ok_or(ApiError::NotFound)?;
    let author = state
        .store
        .get_profile(post.author_id)?
        .ok_or(ApiError::NotFound)?;
    if !can_view_post(&principal, &author) {
        return Err(ApiError::NotFound);
    }
    Ok(Json(PostView::new(post, Utc::now())))
}

#[derive(Debug, Deserialize)]
struct EditPostRequest {
    content: Option<String>,
    scheduled_for: Option<DateTime<Utc>>,
    group_id: Option<Uuid>,
}

async fn edit_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<EditPostRequest>,
) -> Result<Json<PostView>, ApiError> {
    let (principal, author) = require_principal(&state.store, &headers)?;
    let mut post = state.store.get_post(id)?.ok_or(ApiError::NotFound)?;
    if !is_author(&principal, &post) {
        return Err(ApiError::Forbidden);
    }

    // Violation state is re-evaluated on every edit, even when the group
    // is unchanged: the author's assignments or the group's territory may
    // have moved underneath the post.
    let group_id = body.group_id.unwrap_or(post.group_id);
    let group = state
        .store
        .get_group(group_id)?
        .ok_or_else(|| ApiError::Invalid("unknown group".to_string()))?;
    post.retarget(&group, &author.territory_set())?;

    if let Some(content) = body.content {
        post.content = content;
    }
    if let Some(at) = body.scheduled_for {
        post.scheduled_for = at;
    }

    state.store.update_post(&post)?;
    Ok(Json(PostView::new(post, Utc::now())))
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (principal, _) = require_principal(&state.store, &headers)?;
    let post = state.store.get_post(id)?.ok_or(ApiError::NotFound)?;
    if !is_author(&principal, &post) {
        return Err(ApiError::Forbidden);
    }
    post.ensure_deletable()?;
    state.store.delete_post(id)?;
    Ok(Json(json!({ "deleted": true })))
}

async fn mark_posted(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<PostView>, ApiError> {
    let (principal, _) = require_principal(&state.store, &headers)?;
    let mut post = state.store.get_post(id)?.ok_or(ApiError::NotFound)?;
    if !is_author(&principal, &post) {
        return Err(ApiError::Forbidden);
    }
    let now = Utc::now();
    post.mark_posted(now)?;
    state.store.update_post(&post)?;
    Ok(Json(PostView::new(post, now)))
}

async fn request_authorization(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<PostView>, ApiError> {
    let (principal, _) = require_principal(&state.store, &headers)?;
    let mut post = state.store.get_post(id)?.ok_or(ApiError::NotFound)?;
    if !is_author(&principal, &post) {
        return Err(ApiError::Forbidden);
    }
    let now = Utc::now();
    post.violation
        .as_mut()
        .ok_or(ApiError::Domain(DomainError::NoViolation))?
        .request_authorization(now)?;
    state.store.update_post(&post)?;
    Ok(Json(PostView::new(post, now)))
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<PostView>, ApiError> {
    let (principal, _) = require_principal(&state.store, &headers)?;
    let mut post = state.store.get_post(id)?.ok_or(ApiError::NotFound)?;
    let author = state
        .store
        .get_profile(post.author_id)?
        .ok_or(ApiError::NotFound)?;
    if !principal.can_decide_authorization(author.dealership_id) {
        return Err(ApiError::Forbidden);
    }
    let now = Utc::now();
    post.violation
        .as_mut()
        .ok_or(ApiError::Domain(DomainError::NoViolation))?
        .authorize(principal.profile_id, now)?;
    state.store.update_post(&post)?;
    Ok(Json(PostView::new(post, now)))
}

async fn deny(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<PostView>, ApiError> {
    let (principal, _) = require_principal(&state.store, &headers)?;
    let mut post = state.store.get_post(id)?.ok_or(ApiError::NotFound)?;
    let author = state
        .store
        .get_profile(post.author_id)?
        .ok_or(ApiError::NotFound)?;
    if !principal.can_decide_authorization(author.dealership_id) {
        return Err(ApiError::Forbidden);
    }
    post.violation
        .as_mut()
        .ok_or(ApiError::Domain(DomainError::NoViolation))?
        .deny()?;
    state.store.update_post(&post)?;
    Ok(Json(PostView::new(post, Utc::now())))
}

#[derive(Debug, Deserialize)]
struct JustifyRequest {
    justification: String,
}

async fn justify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<JustifyRequest>,
) -> Result<Json<PostView>, ApiError> {
    let (principal, _) = require_principal(&state.store, &headers)?;
    let mut post = state.store.get_post(id)?.ok_or(ApiError::NotFound)?;
    if !is_author(&principal, &post) {
        return Err(ApiError::Forbidden);
    }
    post.violation
        .as_mut()
        .ok_or(ApiError::Domain(DomainError::NoViolation))?
        .justify(&body.justification)?;
    state.store.update_post(&post)?;
    Ok(Json(PostView::new(post, Utc::now())))
}

#[derive(Debug, Deserialize)]
struct ReportParams {
    author_id: Option<Uuid>,
}

/// Aggregate compliance numbers for a population of posts.
#[derive(Debug, Default, Serialize)]
struct ComplianceReport {
    total: usize,
    violations: usize,
    unresolved: usize,
    authorization_requested: usize,
    authorized: usize,
    denied: usize,
    justified: usize,
    /// Percentage of posts that are non-violating or resolved, rounded
    /// to the nearest integer.
    compliance_rate: u8,
}

async fn compliance_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ReportParams>,
) -> Result<Json<ComplianceReport>, ApiError> {
    let (principal, _) = require_principal(&state.store, &headers)?;

    let scope = match params.author_id {
        Some(author_id) => {
            let author = state
                .store
                .get_profile(author_id)?
                .ok_or(ApiError::NotFound)?;
            if !can_view_post(&principal, &author) {
                return Err(ApiError::Forbidden);
            }
            PostScope::Author(author_id)
        }
        None => match principal.role {
            Role::Salesperson => PostScope::Author(principal.profile_id),
            Role::Manager => PostScope::Dealership(principal.dealership_id),
            Role::Owner => PostScope::All,
        },
    };

    let posts = state.store.list_posts(scope)?;
    let mut report = ComplianceReport {
        total: posts.len(),
        compliance_rate: compliance_rate(&posts),
        ..Default::default()
    };
    for post in &posts {
        if let Some(v) = &post.violation {
            report.violations += 1;
            match v.status {
                ViolationStatus::Unresolved => report.unresolved += 1,
                ViolationStatus::AuthorizationRequested => report.authorization_requested += 1,
                ViolationStatus::Authorized => report.authorized += 1,
                ViolationStatus::Denied => report.denied += 1,
                ViolationStatus::Justified => report.justified += 1,
            }
        }
    }
    Ok(Json(report))
}

/// The reminder trigger. Invoked by an external timer, idempotent by
/// design: the per-post claim makes extra invocations harmless.
async fn run_reminders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<RunSummary>, ApiError> {
    require_trigger_token(state.trigger_token.as_deref(), &headers)?;
    let summary = state.scheduler.run_once(Utc::now()).await?;
    Ok(Json(summary))
}
