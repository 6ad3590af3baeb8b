//! SQLite persistence for Lotcast.
//!
//! One store owns the whole schema: the directory tables (territories,
//! profiles, groups) and the `scheduled_posts` table with its reminder
//! bookkeeping. The store is also where the atomic reminder claim lives:
//! the conditional update that makes overlapping scheduler runs safe.

mod error;
mod store;

pub use error::StoreError;
pub use store::{PostScope, Store};
