//! Cache Module
//!
//! Provides a generic in-memory cache with per-entry TTL expiration.

mod clock;
mod entry;
mod stats;
mod store;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, Expiration};
pub use stats::CacheStats;
pub use store::Cache;
