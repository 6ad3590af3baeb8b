//! HTTP adapters for Lotcast's external collaborators.
//!
//! Two thin clients live here: the content-generation service (structured
//! prompt parameters in, post copy out) and the email transport (recipient,
//! subject, body in, delivery id out). Both are black boxes to the rest of
//! the system; their failures are mapped into [`DispatchError`] and
//! isolated per candidate by the reminder scheduler.

mod error;
mod generation;
mod mail;

pub use error::DispatchError;
pub use generation::{GenerationClient, GenerationRequest};
pub use mail::MailClient;
