//! TTL Scheduler
//!
//! Keys with a time-to-live are tracked in a [`TtlIndex`] (a min-heap by
//! deadline). A single background task sleeps until the earliest deadline,
//! removes everything that is due, and hands each expired key to a deletion
//! callback.
//!
//! ## Worker loop
//!
//! ```text
//!        ┌──────────────────────────────┐
//!        │ peek earliest deadline       │◄──────────────┐
//!        └──────────────┬───────────────┘               │
//!             empty?    │     deadline in future?       │
//!     ┌─────────────────┼──────────────────┐            │
//!     ▼                 ▼                  │ already due│
//!  wait for          sleep until           │            │
//!  wake/cancel       deadline, wake        │            │
//!     │              or cancel             │            │
//!     │ wake            │ deadline         ▼            │
//!     │                 └──────────► drain all due ─────┤
//!     └─────────────────────────────────────────────────┘
//! ```
//!
//! A wake (any `set_ttl`) always re-runs the peek: the new entry may be
//! earlier than the deadline the worker was sleeping towards.
//!
//! The wake signal is a [`Notify`]: `notify_one` with nobody waiting leaves a
//! single stored permit, so a burst of `set_ttl` calls collapses into one
//! wake-up. That is enough, since every wake-up re-reads the whole heap.
//!
//! ## Deletion callbacks
//!
//! Expired entries leave the index under the lock; the callback runs later,
//! on its own task, outside the lock, with at most
//! [`ExpiryConfig::max_inflight_callbacks`] running at once. A slow or
//! panicking callback therefore never blocks the worker or other keys.
//! Callers must not assume the store entry is gone the instant the TTL
//! entry is: `GET` right after expiry may still see the value for a moment.

use crate::storage::index::TtlIndex;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Configuration for the TTL scheduler.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Maximum number of deletion callbacks running concurrently
    /// (default: 64)
    pub max_inflight_callbacks: usize,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            max_inflight_callbacks: 64,
        }
    }
}

/// Errors returned by [`TtlScheduler`] operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TtlError {
    /// The scheduler has been stopped; no new expirations are accepted.
    #[error("scheduler stopped")]
    Stopped,
}

/// Invoked once per expired key.
pub type ExpireCallback = Arc<dyn Fn(String) + Send + Sync + 'static>;

struct Shared {
    index: Mutex<TtlIndex>,
    wake: Notify,
    cancel: CancellationToken,
}

impl Shared {
    // Every index operation is a single call that either completes or
    // panics before mutating, so a poisoned lock still guards a valid heap.
    fn index(&self) -> MutexGuard<'_, TtlIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Heap-ordered expiration service with a single background worker.
///
/// # Example
///
/// ```
/// use radish::storage::{ExpiryConfig, Store, TtlScheduler};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tokio::time::Instant;
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = Arc::new(Store::new());
/// store.set("session", "abc123");
///
/// let cancel = CancellationToken::new();
/// let scheduler = TtlScheduler::start(&cancel, ExpiryConfig::default(), {
///     let store = Arc::clone(&store);
///     move |key: String| {
///         store.delete(&key);
///     }
/// });
///
/// scheduler
///     .set_ttl("session", Instant::now() + Duration::from_secs(60))
///     .unwrap();
/// assert!(scheduler.get_ttl("session").is_some());
///
/// scheduler.shutdown().await;
/// # }
/// ```
pub struct TtlScheduler {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TtlScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlScheduler")
            .field("scheduled", &self.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl TtlScheduler {
    /// Starts the background worker on the current Tokio runtime.
    ///
    /// The worker stops when `cancel` (or any of its parents) is cancelled,
    /// when [`stop`](Self::stop) is called, or when the scheduler is dropped.
    /// Stopping the scheduler does not cancel `cancel` itself.
    pub fn start<F>(cancel: &CancellationToken, config: ExpiryConfig, on_expire: F) -> Self
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            index: Mutex::new(TtlIndex::new()),
            wake: Notify::new(),
            cancel: cancel.child_token(),
        });

        let callbacks = Arc::new(Semaphore::new(config.max_inflight_callbacks.max(1)));
        let worker = tokio::spawn(worker_loop(
            Arc::clone(&shared),
            Arc::new(on_expire),
            callbacks,
        ));

        info!(
            max_inflight_callbacks = config.max_inflight_callbacks,
            "TTL scheduler started"
        );

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Schedules `key` to expire at `expires_at`, replacing any deadline it
    /// already had.
    ///
    /// Returns [`TtlError::Stopped`] once the scheduler has been stopped.
    pub fn set_ttl(&self, key: impl Into<String>, expires_at: Instant) -> Result<(), TtlError> {
        let key = key.into();
        if self.shared.cancel.is_cancelled() {
            warn!(key = %key, "TTL rejected, scheduler stopped");
            return Err(TtlError::Stopped);
        }

        let replaced = self.shared.index().insert(key, expires_at);
        trace!(replaced = replaced.is_some(), "TTL scheduled");

        self.shared.wake.notify_one();
        Ok(())
    }

    /// The deadline scheduled for `key`, if it has one.
    pub fn get_ttl(&self, key: &str) -> Option<Instant> {
        self.shared.index().get(key)
    }

    /// Discards every pending expiration. No callbacks fire for them.
    pub fn flush_all(&self) {
        self.shared.index().clear();
    }

    /// Number of keys with a pending expiration.
    pub fn len(&self) -> usize {
        self.shared.index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tells the worker to exit. Calling it again has no further effect.
    pub fn stop(&self) {
        if !self.shared.cancel.is_cancelled() {
            info!("TTL scheduler stopping");
        }
        self.shared.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Stops the worker and waits for it to exit.
    pub async fn shutdown(&self) {
        self.stop();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "TTL worker ended abnormally");
            }
        }
    }
}

impl Drop for TtlScheduler {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

/// The background worker.
async fn worker_loop(shared: Arc<Shared>, on_expire: ExpireCallback, callbacks: Arc<Semaphore>) {
    loop {
        let next_deadline = shared.index().peek().map(|entry| entry.expires_at);

        match next_deadline {
            None => {
                tokio::select! {
                    biased;
                    _ = shared.cancel.cancelled() => break,
                    _ = shared.wake.notified() => {
                        debug!("TTL worker woken while idle");
                        continue;
                    }
                }
            }
            Some(deadline) if deadline > Instant::now() => {
                tokio::select! {
                    biased;
                    _ = shared.cancel.cancelled() => break,
                    _ = shared.wake.notified() => {
                        debug!("TTL worker woken before deadline");
                        continue;
                    }
                    _ = sleep_until(deadline) => {}
                }
            }
            Some(_) => {}
        }

        let expired = shared.index().pop_expired(Instant::now());
        if !expired.is_empty() {
            debug!(count = expired.len(), "Draining expired keys");
        }

        for entry in expired {
            dispatch(entry.key, &on_expire, &callbacks);
        }
    }

    debug!("TTL worker stopped");
}

/// Runs the deletion callback for one key on its own task.
fn dispatch(key: String, on_expire: &ExpireCallback, callbacks: &Arc<Semaphore>) {
    let on_expire = Arc::clone(on_expire);
    let callbacks = Arc::clone(callbacks);

    tokio::spawn(async move {
        // The semaphore is never closed.
        let Ok(_permit) = callbacks.acquire_owned().await else {
            return;
        };
        debug!(key = %key, "Key expired");
        on_expire(key);
    });
}
