//! Principal resolution.
//!
//! Authentication itself is handled upstream (a trusted proxy sets the
//! profile header after verifying the session). This module turns that
//! asserted identity into a [`Principal`] by loading the profile, so
//! role and dealership always come from the store, never from headers.

use axum::http::HeaderMap;
use uuid::Uuid;

use lotcast_core::{Principal, Profile};
use lotcast_db::Store;

use crate::error::ApiError;

/// Header carrying the authenticated profile id.
pub const PROFILE_HEADER: &str = "x-lotcast-profile";

/// Resolve the caller's principal, or reject the request.
pub fn require_principal(
    store: &Store,
    headers: &HeaderMap,
) -> Result<(Principal, Profile), ApiError> {
    let id = headers
        .get(PROFILE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(ApiError::Unauthorized)?;

    let profile = store.get_profile(id)?.ok_or(ApiError::Unauthorized)?;
    let principal = Principal {
        profile_id: profile.id,
        dealership_id: profile.dealership_id,
        role: profile.role,
    };
    Ok((principal, profile))
}

/// Check the trigger endpoint's bearer token before anything else runs.
pub fn require_trigger_token(
    configured: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), ApiError> {
    let expected = configured.ok_or(ApiError::Config("trigger token"))?;
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;
    if presented != expected {
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}
