//! TTL Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::io;
use std::sync::Weak;
use std::thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

// == Sweepable ==
/// Storage the sweep task can reclaim expired entries from.
pub(crate) trait Sweepable: Send + Sync + 'static {
    /// Snapshot of keys that are expired right now.
    fn expired_keys(&self) -> Vec<String>;

    /// Removes each of `keys` that is still expired, returning how many were
    /// removed. A key rewritten since the snapshot is left alone.
    fn evict_expired(&self, keys: &[String]) -> usize;
}

// == Sweep Handle ==
/// Where the sweep loop is running.
#[derive(Debug)]
enum SweepWorker {
    /// Task on a runtime the caller owns
    Task(JoinHandle<()>),
    /// Dedicated thread driving a runtime the cache owns
    Thread(thread::JoinHandle<()>),
}

/// Owned handle to a running sweep.
#[derive(Debug)]
pub(crate) struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    worker: SweepWorker,
}

impl SweepHandle {
    /// Signals the sweep to stop.
    ///
    /// A task is aborted if it is mid-sweep. A dedicated thread is joined, so
    /// its runtime is shut down by the time this returns.
    pub(crate) fn stop(self) {
        // The receiver is gone if the loop already exited
        let _ = self.shutdown_tx.send(true);
        match self.worker {
            SweepWorker::Task(handle) => handle.abort(),
            SweepWorker::Thread(handle) => {
                if handle.join().is_err() {
                    warn!("TTL sweep thread panicked");
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        match &self.worker {
            SweepWorker::Task(handle) => handle.is_finished(),
            SweepWorker::Thread(handle) => handle.is_finished(),
        }
    }
}

/// Spawns the sweep of `target` as a task on `runtime`.
///
/// The task holds only a weak reference, so it exits on its own once the
/// store is dropped. Expired keys are removed `batch_size` at a time, yielding
/// to the runtime between batches.
///
/// # Arguments
/// * `runtime` - Runtime that hosts the task
/// * `target` - Store to sweep
/// * `interval` - Time between sweeps
/// * `batch_size` - Keys removed per batch (must be non-zero)
pub(crate) fn spawn_sweep_task<S: Sweepable>(
    runtime: &Handle,
    target: Weak<S>,
    interval: Duration,
    batch_size: usize,
) -> SweepHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = runtime.spawn(run_sweep(target, interval, batch_size, shutdown_rx));

    SweepHandle {
        shutdown_tx,
        worker: SweepWorker::Task(handle),
    }
}

/// Spawns the sweep of `target` on a dedicated thread with its own
/// single-threaded runtime, for callers that have no runtime of their own.
///
/// # Errors
/// Fails if the runtime cannot be built or the thread cannot be spawned.
pub(crate) fn spawn_sweep_thread<S: Sweepable>(
    target: Weak<S>,
    interval: Duration,
    batch_size: usize,
) -> io::Result<SweepHandle> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = thread::Builder::new()
        .name("ttl-cache-sweep".to_string())
        .spawn(move || {
            runtime.block_on(run_sweep(target, interval, batch_size, shutdown_rx));
        })?;

    Ok(SweepHandle {
        shutdown_tx,
        worker: SweepWorker::Thread(handle),
    })
}

/// Sweep loop shared by both hosting modes.
async fn run_sweep<S: Sweepable>(
    target: Weak<S>,
    interval: Duration,
    batch_size: usize,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(
        interval_ms = interval.as_millis() as u64,
        batch_size, "Starting TTL sweep task"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; wait a full interval first
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(store) = target.upgrade() else {
                    break;
                };
                let removed = sweep_in_batches(store.as_ref(), batch_size).await;

                if removed > 0 {
                    info!("TTL sweep: removed {} expired entries", removed);
                } else {
                    debug!("TTL sweep: no expired entries found");
                }
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("TTL sweep task stopped");
}

/// Runs one sweep pass over `target`.
async fn sweep_in_batches<S: Sweepable>(target: &S, batch_size: usize) -> usize {
    let expired = target.expired_keys();
    let mut removed = 0;

    for (index, batch) in expired.chunks(batch_size.max(1)).enumerate() {
        if index > 0 {
            tokio::task::yield_now().await;
        }
        removed += target.evict_expired(batch);
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Fake store whose expired set is controlled by the test.
    #[derive(Default)]
    struct FakeStore {
        expired: Mutex<HashSet<String>>,
        batches: Mutex<Vec<usize>>,
    }

    impl FakeStore {
        fn with_expired(keys: &[&str]) -> Self {
            let store = Self::default();
            store
                .expired
                .lock()
                .unwrap()
                .extend(keys.iter().map(|k| k.to_string()));
            store
        }
    }

    impl Sweepable for FakeStore {
        fn expired_keys(&self) -> Vec<String> {
            self.expired.lock().unwrap().iter().cloned().collect()
        }

        fn evict_expired(&self, keys: &[String]) -> usize {
            self.batches.lock().unwrap().push(keys.len());
            let mut expired = self.expired.lock().unwrap();
            keys.iter().filter(|k| expired.remove(*k)).count()
        }
    }

    #[tokio::test]
    async fn test_sweep_in_batches_respects_batch_size() {
        let store = FakeStore::with_expired(&["a", "b", "c", "d", "e"]);

        let removed = sweep_in_batches(&store, 2).await;

        assert_eq!(removed, 5);
        assert_eq!(*store.batches.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let store = Arc::new(FakeStore::with_expired(&["expire_soon"]));

        let handle = spawn_sweep_task(
            &Handle::current(),
            Arc::downgrade(&store),
            Duration::from_millis(10),
            8,
        );

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(store.expired.lock().unwrap().is_empty());
        handle.stop();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_stopped() {
        let store = Arc::new(FakeStore::default());

        let handle = spawn_sweep_task(
            &Handle::current(),
            Arc::downgrade(&store),
            Duration::from_millis(10),
            8,
        );
        assert_eq!(Arc::weak_count(&store), 1);

        handle.stop();

        // The finished task releases its weak reference
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(Arc::weak_count(&store), 0, "Task should be finished after stop");
    }

    #[tokio::test]
    async fn test_sweep_task_exits_when_store_dropped() {
        let store = Arc::new(FakeStore::default());

        let handle = spawn_sweep_task(
            &Handle::current(),
            Arc::downgrade(&store),
            Duration::from_millis(10),
            8,
        );
        drop(store);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should exit once the store is gone");
    }

    #[test]
    fn test_sweep_thread_runs_without_ambient_runtime() {
        let store = Arc::new(FakeStore::with_expired(&["a", "b", "c"]));

        let handle =
            spawn_sweep_thread(Arc::downgrade(&store), Duration::from_millis(10), 2).unwrap();

        std::thread::sleep(Duration::from_millis(100));
        assert!(store.expired.lock().unwrap().is_empty());

        handle.stop();
        assert_eq!(Arc::weak_count(&store), 0, "Thread should be joined after stop");
    }

    #[test]
    fn test_sweep_thread_exits_when_store_dropped() {
        let store = Arc::new(FakeStore::default());

        let handle =
            spawn_sweep_thread(Arc::downgrade(&store), Duration::from_millis(10), 8).unwrap();
        drop(store);

        std::thread::sleep(Duration::from_millis(100));
        assert!(handle.is_finished(), "Thread should exit once the store is gone");
    }
}
