//! TTL Cache demo
//!
//! Memoizes an expensive page render through the cache, lets the entry
//! expire, and prints the resulting statistics as JSON.
//!
//! Timing is read from `CACHE_DEFAULT_EXPIRY_MS` and `CACHE_SWEEP_INTERVAL_MS`,
//! sweep options from `CACHE_SWEEP_ENABLED` and `CACHE_SWEEP_BATCH_SIZE`.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttl_cache::{Cache, CacheConfig, CacheSettings};

/// Stand-in for a computation a caller would want to memoize.
///
/// It runs under the key's shard lock inside `get_or_set_with`, so it must
/// stay quick and must not block.
fn render_page(path: &str) -> String {
    let items: String = (1..=8)
        .map(|n| format!("<li>{path} item {n}</li>"))
        .collect();
    format!("<html><body><ul>{items}</ul></body></html>")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = CacheSettings::from_env();
    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: default_expiry={:?}, sweep_interval={:?}, sweep_enabled={}, sweep_batch_size={}",
        settings.default_expiry, settings.sweep_interval, config.sweep_enabled, config.sweep_batch_size
    );

    let cache: Cache<String> = Cache::new(settings.default_expiry, settings.sweep_interval, config)
        .context("failed to build cache")?;

    for path in ["/", "/about", "/", "/", "/about"] {
        let page = cache.get_or_set_with(path, || render_page(path))?;
        info!(path, bytes = page.len(), "served page");
    }

    // Short-lived entry, gone after one sweep interval
    cache.set_with_duration("flash", "saved!".to_string(), settings.sweep_interval)?;
    tokio::time::sleep(settings.sweep_interval * 2).await;
    if cache.get("flash").is_some() {
        warn!("flash entry outlived its TTL");
    }

    let stats = cache.stats();
    println!("{}", serde_json::to_string_pretty(&stats)?);
    info!("hit rate {:.2}", stats.hit_rate());

    cache.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_page_is_memoized_once() {
        let cache: Cache<String> = Cache::new(
            std::time::Duration::from_secs(60),
            std::time::Duration::from_secs(1),
            CacheConfig::default().with_sweep_disabled(),
        )
        .unwrap();

        let first = cache.get_or_set_with("/", || render_page("/")).unwrap();
        let second = cache
            .get_or_set_with("/", || unreachable!("page should come from the cache"))
            .unwrap();

        assert!(first.contains("<li>/ item 8</li>"));
        assert_eq!(first, second);
    }
}
