//! Durable delivery state.
//!
//! One [`DeliveryRecord`](crate::types::DeliveryRecord) per version, kept in
//! a single file next to a lock file. The store is the source of truth for
//! delivery status only; content and fingerprints are refreshed from the
//! changelog on every upsert.

mod delivery;
mod file;

pub use delivery::DeliveryStore;
pub use file::{STORE_MAGIC, STORE_VERSION};
