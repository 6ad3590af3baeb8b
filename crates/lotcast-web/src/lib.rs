//! HTTP API for Lotcast.
//!
//! Synchronous post operations (create, edit, delete, mark-posted, and
//! the violation-resolution actions) plus the bearer-token trigger
//! endpoint an external timer calls to start a reminder run.
//!
//! Every handler receives the caller's identity as an explicit
//! [`lotcast_core::Principal`] resolved from the request; there is no
//! ambient auth context.

mod error;
mod principal;
mod routes;

pub use error::ApiError;
pub use routes::{AppState, create_router};
