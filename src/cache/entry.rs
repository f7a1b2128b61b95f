//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::sync::Arc;
use std::time::{Duration, Instant};

// == Expiration ==
/// Expiration policy of a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// The entry stays live until deleted or overwritten
    Never,
    /// The entry stops being live at this instant
    At(Instant),
}

impl Expiration {
    // == From TTL ==
    /// Builds the policy for a TTL measured from `now`.
    ///
    /// A zero TTL means the entry never expires. A TTL too large to represent
    /// as an instant is treated the same way.
    pub fn from_ttl(ttl: Duration, now: Instant) -> Self {
        if ttl.is_zero() {
            return Expiration::Never;
        }
        now.checked_add(ttl)
            .map_or(Expiration::Never, Expiration::At)
    }

    // == Is Expired ==
    /// Checks if the policy has elapsed at `now`.
    ///
    /// Boundary condition: an entry is expired once `now` reaches the
    /// expiration instant, so it is live only while `expires_at > now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self {
            Expiration::Never => false,
            Expiration::At(expires_at) => now >= *expires_at,
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The stored value, shared with callers of `get`
    pub value: Arc<V>,
    /// When the entry stops being live
    pub expiration: Expiration,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl` - Time to live, zero for no expiration
    /// * `now` - Current instant according to the store's clock
    pub fn new(value: V, ttl: Duration, now: Instant) -> Self {
        Self {
            value: Arc::new(value),
            expiration: Expiration::from_ttl(ttl, now),
        }
    }

    /// Returns true if the entry is visible to readers at `now`.
    pub fn is_live(&self, now: Instant) -> bool {
        !self.expiration.is_expired(now)
    }

    /// Returns true if the entry has logically expired at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expiration.is_expired(now)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation_no_ttl() {
        let now = Instant::now();
        let entry = CacheEntry::new("test_value", Duration::ZERO, now);

        assert_eq!(*entry.value, "test_value");
        assert_eq!(entry.expiration, Expiration::Never);
        assert!(entry.is_live(now + Duration::from_secs(86_400 * 365)));
    }

    #[test]
    fn test_entry_creation_with_ttl() {
        let now = Instant::now();
        let entry = CacheEntry::new("test_value", Duration::from_secs(60), now);

        assert_eq!(entry.expiration, Expiration::At(now + Duration::from_secs(60)));
        assert!(entry.is_live(now));
    }

    #[test]
    fn test_entry_expiration() {
        let now = Instant::now();
        let entry = CacheEntry::new("test_value", Duration::from_millis(100), now);

        assert!(entry.is_live(now + Duration::from_millis(99)));
        assert!(entry.is_expired(now + Duration::from_millis(101)));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = Instant::now();
        let entry = CacheEntry::new("test", Duration::from_millis(50), now);

        // Expired exactly at the expiration instant
        assert!(entry.is_expired(now + Duration::from_millis(50)));
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let now = Instant::now();
        assert_eq!(Expiration::from_ttl(Duration::MAX, now), Expiration::Never);
    }
}
