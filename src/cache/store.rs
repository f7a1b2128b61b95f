//! Cache Store Module
//!
//! Main cache engine combining sharded storage with lazy TTL checks and a
//! background sweep.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tracing::info;

use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheEntry, CacheStats, Clock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweep_task, spawn_sweep_thread, SweepHandle, Sweepable};

// == Shared State ==
/// State shared between cache callers and the sweep task.
struct Inner<V> {
    /// Key-value storage, sharded so different keys rarely contend
    entries: DashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: StatsRecorder,
    /// TTL applied by `set`, `add` and `replace`
    default_expiry: Duration,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
}

impl<V: Send + Sync + 'static> Sweepable for Inner<V> {
    fn expired_keys(&self) -> Vec<String> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    fn evict_expired(&self, keys: &[String]) -> usize {
        let now = self.clock.now();
        let removed = keys
            .iter()
            .filter(|key| {
                self.entries
                    .remove_if(key.as_str(), |_, entry| entry.is_expired(now))
                    .is_some()
            })
            .count();

        self.stats.record_sweep_evictions(removed as u64);
        removed
    }
}

// == Cache ==
/// Thread-safe key-value cache with per-entry expiration.
///
/// Reads check liveness themselves, so an expired entry is never returned
/// even if the sweep has not reached it yet. The sweep only reclaims memory.
///
/// The cache is not `Clone`; share it behind an `Arc`. Dropping it stops the
/// sweep task and releases every entry.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ttl_cache::{Cache, CacheConfig, CacheError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> ttl_cache::Result<()> {
/// let cache = Cache::new(
///     Duration::from_secs(300),
///     Duration::from_secs(1),
///     CacheConfig::default(),
/// )?;
///
/// cache.set("greeting", "hello".to_string())?;
/// assert_eq!(cache.get("greeting").as_deref(), Some(&"hello".to_string()));
///
/// let err = cache.add("greeting", "again".to_string()).unwrap_err();
/// assert!(matches!(err, CacheError::KeyExists(_)));
/// # Ok(())
/// # }
/// ```
pub struct Cache<V> {
    inner: Arc<Inner<V>>,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl<V> Cache<V> {
    // == Constructor ==
    /// Creates a cache and starts its background sweep.
    ///
    /// # Arguments
    /// * `default_expiry` - TTL for `set`, `add` and `replace`; zero means never expire
    /// * `sweep_interval` - Time between background sweeps, must be non-zero
    /// * `config` - Construction-time options
    ///
    /// The sweep runs on `config.runtime` if set, else on the ambient Tokio
    /// runtime. Without either, the cache starts a dedicated sweep thread with
    /// its own runtime and joins it on close.
    ///
    /// # Errors
    /// `InvalidConfiguration` if the interval or an option is malformed.
    pub fn new(
        default_expiry: Duration,
        sweep_interval: Duration,
        config: CacheConfig,
    ) -> Result<Self>
    where
        V: Send + Sync + 'static,
    {
        config.validate()?;
        if sweep_interval.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "sweep interval must be greater than zero".to_string(),
            ));
        }

        let inner = Arc::new(Inner {
            entries: DashMap::new(),
            stats: StatsRecorder::default(),
            default_expiry,
            clock: config.clock,
            closed: AtomicBool::new(false),
        });

        let sweeper = if config.sweep_enabled {
            let target = Arc::downgrade(&inner);
            let handle = match config.runtime.or_else(|| Handle::try_current().ok()) {
                Some(runtime) => {
                    spawn_sweep_task(&runtime, target, sweep_interval, config.sweep_batch_size)
                }
                None => spawn_sweep_thread(target, sweep_interval, config.sweep_batch_size)
                    .map_err(|e| {
                        CacheError::InvalidConfiguration(format!(
                            "failed to start sweep thread: {e}"
                        ))
                    })?,
            };
            Some(handle)
        } else {
            None
        };

        Ok(Self {
            inner,
            sweeper: Mutex::new(sweeper),
        })
    }

    // == Set ==
    /// Inserts or overwrites `key` using the default expiry.
    ///
    /// # Errors
    /// `StoreClosed` after [`Cache::close`].
    pub fn set(&self, key: impl Into<String>, value: V) -> Result<()> {
        self.set_with_duration(key, value, self.inner.default_expiry)
    }

    // == Set With Duration ==
    /// Inserts or overwrites `key` with an explicit TTL. A zero TTL means the
    /// entry never expires.
    ///
    /// # Errors
    /// `StoreClosed` after [`Cache::close`].
    pub fn set_with_duration(&self, key: impl Into<String>, value: V, ttl: Duration) -> Result<()> {
        self.ensure_open()?;
        let entry = CacheEntry::new(value, ttl, self.now());
        let slot = self.inner.entries.entry(key.into()).insert(entry);
        self.release_if_closed(slot)
    }

    // == Add ==
    /// Inserts `key` only if no live entry exists for it.
    ///
    /// An expired entry the sweep has not removed yet counts as absent.
    ///
    /// # Errors
    /// `KeyExists` if a live entry is present, `StoreClosed` after close.
    pub fn add(&self, key: impl Into<String>, value: V) -> Result<()> {
        self.ensure_open()?;
        let now = self.now();
        let entry = CacheEntry::new(value, self.inner.default_expiry, now);

        let slot = match self.inner.entries.entry(key.into()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Err(CacheError::KeyExists(occupied.key().clone()));
                }
                occupied.insert(entry);
                occupied.into_ref()
            }
            Entry::Vacant(vacant) => vacant.insert(entry),
        };
        self.release_if_closed(slot)
    }

    // == Replace ==
    /// Overwrites `key` only if a live entry exists for it.
    ///
    /// The expiration is reset to the default expiry, exactly as `set` does;
    /// the old entry's remaining TTL is not carried over.
    ///
    /// # Errors
    /// `KeyNotFound` if nothing live is stored under `key` (the entry is left
    /// untouched), `StoreClosed` after close.
    pub fn replace(&self, key: &str, value: V) -> Result<()> {
        self.ensure_open()?;
        let now = self.now();

        match self.inner.entries.get_mut(key) {
            Some(mut existing) if existing.is_live(now) => {
                *existing = CacheEntry::new(value, self.inner.default_expiry, now);
                self.release_if_closed(existing)
            }
            _ => Err(CacheError::KeyNotFound(key.to_string())),
        }
    }

    // == Get ==
    /// Returns the value stored under `key` if its entry is live.
    ///
    /// Never-set and expired keys are both plain misses.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        if self.is_closed() {
            return None;
        }
        let now = self.now();

        let value = self
            .inner
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| Arc::clone(&entry.value));

        match value {
            Some(_) => self.inner.stats.record_hit(),
            None => self.inner.stats.record_miss(),
        }
        value
    }

    // == Get Or Set With ==
    /// Returns the live value under `key`, or stores and returns `init()`
    /// with the default expiry.
    ///
    /// `init` runs while the key's shard is locked, so concurrent callers for
    /// the same key compute it once. It must be quick, must not block, and
    /// must not call back into this cache.
    ///
    /// # Errors
    /// `StoreClosed` after [`Cache::close`].
    pub fn get_or_set_with<F>(&self, key: impl Into<String>, init: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> V,
    {
        self.ensure_open()?;
        let now = self.now();

        let slot = match self.inner.entries.entry(key.into()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    self.inner.stats.record_hit();
                    return Ok(Arc::clone(&occupied.get().value));
                }
                occupied.insert(CacheEntry::new(init(), self.inner.default_expiry, now));
                occupied.into_ref()
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(init(), self.inner.default_expiry, now))
            }
        };
        let value = Arc::clone(&slot.value);
        self.release_if_closed(slot)?;

        self.inner.stats.record_miss();
        Ok(value)
    }

    // == Delete ==
    /// Removes `key` if present. Deleting a missing key is a no-op.
    pub fn delete(&self, key: &str) {
        if self.inner.entries.remove(key).is_some() {
            self.inner.stats.record_delete();
        }
    }

    // == Sweep Now ==
    /// Runs one sweep pass immediately.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_now(&self) -> usize
    where
        V: Send + Sync + 'static,
    {
        let expired = self.inner.expired_keys();
        self.inner.evict_expired(&expired)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.inner.entries.len())
    }

    // == Length ==
    /// Returns the number of entries in the table, including expired entries
    /// the sweep has not removed yet.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    // == Close ==
    /// Stops the sweep task and releases every entry.
    ///
    /// Afterwards writes fail with `StoreClosed`, `get` returns `None` and
    /// `delete` does nothing. Closing twice is a no-op.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let sweeper = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sweeper) = sweeper {
            sweeper.stop();
        }

        let released = self.inner.entries.len();
        self.inner.entries.clear();
        info!("Cache closed, released {} entries", released);
    }

    /// Returns true once [`Cache::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Undoes a write that raced with [`Cache::close`].
    ///
    /// `slot` is the entry just written, still locked. If the cache closed
    /// after `ensure_open` passed, `close` may already have cleared this shard,
    /// so the write is removed here and reported as `StoreClosed`.
    fn release_if_closed(&self, slot: RefMut<'_, String, CacheEntry<V>>) -> Result<()> {
        if !self.is_closed() {
            return Ok(());
        }
        let key = slot.key().clone();
        drop(slot);
        self.inner.entries.remove(&key);
        Err(CacheError::StoreClosed)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(CacheError::StoreClosed)
        } else {
            Ok(())
        }
    }

    fn now(&self) -> Instant {
        self.inner.clock.now()
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<V> std::fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &self.inner.entries.len())
            .field("default_expiry", &self.inner.default_expiry)
            .field("closed", &self.is_closed())
            .finish()
    }
}
