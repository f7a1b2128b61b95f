//! TTL Cache - A generic, thread-safe in-memory cache
//!
//! Every entry carries an expiration policy. Expired entries are invisible to
//! readers as soon as they expire, and a background sweep reclaims their
//! memory on a fixed interval.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{Cache, CacheStats, Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CacheSettings};
pub use error::{CacheError, Result};
