//! Configuration Module
//!
//! Construction-time options for the cache and environment loading for the
//! demo binary.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use crate::cache::{Clock, SystemClock};
use crate::error::{CacheError, Result};

/// Default number of expired keys removed per sweep batch.
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 1024;

// == Cache Config ==
/// Named options applied once when a cache is built.
///
/// # Defaults
/// - `sweep_enabled`: true
/// - `sweep_batch_size`: [`DEFAULT_SWEEP_BATCH_SIZE`]
/// - `clock`: [`SystemClock`]
/// - `runtime`: None (the ambient Tokio runtime is used, or a dedicated
///   sweep thread when there is none)
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ttl_cache::{Cache, CacheConfig};
///
/// let config = CacheConfig::default()
///     .with_sweep_batch_size(256)
///     .with_sweep_disabled();
/// let cache: Cache<String> =
///     Cache::new(Duration::from_secs(60), Duration::from_secs(1), config).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether the background sweep task runs at all
    pub sweep_enabled: bool,
    /// Maximum number of keys removed before the sweep yields to the runtime
    pub sweep_batch_size: usize,
    /// Time source for expiry checks
    pub clock: Arc<dyn Clock>,
    /// Runtime that hosts the sweep task
    pub runtime: Option<Handle>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_enabled: true,
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            clock: Arc::new(SystemClock),
            runtime: None,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_SWEEP_ENABLED` - Run the background sweep (default: true)
    /// - `CACHE_SWEEP_BATCH_SIZE` - Keys removed per sweep batch (default: 1024)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sweep_enabled: env::var("CACHE_SWEEP_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_enabled),
            sweep_batch_size: env::var("CACHE_SWEEP_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_batch_size),
            ..defaults
        }
    }

    /// Caps how many expired keys one sweep batch removes.
    pub fn with_sweep_batch_size(mut self, batch_size: usize) -> Self {
        self.sweep_batch_size = batch_size;
        self
    }

    /// Replaces the time source used for expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Runs the sweep task on `runtime` instead of the ambient one.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Turns the background sweep off. Expired entries then stay in the
    /// table until overwritten, deleted or removed by `sweep_now`.
    pub fn with_sweep_disabled(mut self) -> Self {
        self.sweep_enabled = false;
        self
    }

    // == Validate ==
    /// Rejects option values the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sweep_batch_size == 0 {
            return Err(CacheError::InvalidConfiguration(
                "sweep batch size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// == Cache Settings ==
/// Timing parameters read by the demo binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// TTL applied by `set`, `add` and `replace`
    pub default_expiry: Duration,
    /// Interval between background sweeps
    pub sweep_interval: Duration,
}

impl CacheSettings {
    /// Loads timing parameters from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_EXPIRY_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweep interval in milliseconds (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_expiry: env::var("CACHE_DEFAULT_EXPIRY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_expiry),
            sweep_interval: env::var("CACHE_SWEEP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.sweep_interval),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_expiry: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(1),
        }
    }
}
