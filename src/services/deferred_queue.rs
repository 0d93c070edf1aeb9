//! Thread-safe FIFO with a "wake the consumer" hook that tolerates the
//! consumer not existing yet.
//!
//! Producers (drag-and-drop handlers, URL-scheme callbacks) may push before
//! the consumer loop has registered its wake callback. Instead of losing the
//! wakeup, `push` hands delivery to a disposable retry thread that keeps
//! trying on a fixed backoff until a callback accepts the signal.

use crate::metrics::Metrics;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Returned by a wake callback when the consumer cannot take the signal yet
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("consumer unavailable: {0}")]
pub struct WakeError(pub String);

type WakeFn = Arc<dyn Fn() -> Result<(), WakeError> + Send + Sync>;

struct QueueState<T> {
    items: VecDeque<T>,
    draining: bool,
    closed: bool,
}

struct Inner<T> {
    name: &'static str,
    state: Mutex<QueueState<T>>,
    wake: RwLock<Option<WakeFn>>,
    retry_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wake_fn(&self) -> Option<WakeFn> {
        self.wake.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Order-preserving queue shared between producers and one drain loop.
///
/// Cloning yields another handle to the same queue.
pub struct DeferredQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DeferredQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> DeferredQueue<T> {
    /// Create a queue whose wake retries back off by `retry_interval`
    pub fn new(name: &'static str, retry_interval: Duration) -> Self {
        Self::build(name, retry_interval, None)
    }

    /// Same as [`new`](Self::new), counting wake retries into `metrics`
    pub fn with_metrics(name: &'static str, retry_interval: Duration, metrics: Arc<Metrics>) -> Self {
        Self::build(name, retry_interval, Some(metrics))
    }

    fn build(name: &'static str, retry_interval: Duration, metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    draining: false,
                    closed: false,
                }),
                wake: RwLock::new(None),
                retry_interval,
                metrics,
            }),
        }
    }

    /// Append an item and make sure a consumer gets woken.
    ///
    /// Never blocks on the consumer. When no drain is running, a retry
    /// thread delivers the wake signal; items pushed while a drain is running
    /// are picked up by that drain.
    pub fn push(&self, item: T) {
        let needs_wake = {
            let mut state = self.inner.lock();
            state.items.push_back(item);
            !state.draining && !state.closed
        };

        tracing::debug!(queue = self.inner.name, "item queued");

        if needs_wake {
            spawn_wake(&self.inner);
        }
    }

    /// Install the callback used to wake the consumer.
    ///
    /// Does not flush items that are already queued; pending retry threads
    /// pick the callback up on their next attempt.
    pub fn register_wake<F>(&self, callback: F)
    where
        F: Fn() -> Result<(), WakeError> + Send + Sync + 'static,
    {
        *self.inner.wake.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(callback));
        tracing::debug!(queue = self.inner.name, "wake callback registered");
    }

    /// Start draining. Returns `None` when another drain is already active.
    ///
    /// The returned iterator yields items in FIFO order, removing each one as
    /// it is yielded. Items pushed while it is running are yielded too.
    pub fn drain(&self) -> Option<Drain<T>> {
        let mut state = self.inner.lock();
        if state.draining {
            tracing::debug!(queue = self.inner.name, "drain already active");
            return None;
        }
        state.draining = true;
        Some(Drain {
            inner: Arc::clone(&self.inner),
            finished: false,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_draining(&self) -> bool {
        self.inner.lock().draining
    }

    /// Stop pending and future wake retries. Queued items stay queued.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }
}

fn spawn_wake<T: Send + 'static>(inner: &Arc<Inner<T>>) {
    let name = inner.name;
    let inner = Arc::clone(inner);
    let spawned = thread::Builder::new()
        .name(format!("{name}-wake"))
        .spawn(move || deliver_wake(&inner));

    if let Err(e) = spawned {
        tracing::error!(queue = name, "failed to spawn wake thread: {}", e);
    }
}

/// Retry loop run on a disposable thread until one wake is accepted
fn deliver_wake<T>(inner: &Inner<T>) {
    loop {
        if inner.lock().closed {
            tracing::debug!(queue = inner.name, "queue closed, dropping wake");
            return;
        }

        match inner.wake_fn() {
            Some(wake) => match wake() {
                Ok(()) => return,
                Err(e) => tracing::debug!(queue = inner.name, "wake failed, retrying: {}", e),
            },
            None => tracing::trace!(queue = inner.name, "no consumer yet, retrying"),
        }

        if let Some(metrics) = &inner.metrics {
            metrics.record_wake_retry();
        }
        thread::sleep(inner.retry_interval);
    }
}

/// Active drain over a [`DeferredQueue`]
///
/// The drain flag is cleared under the queue lock at the moment the queue is
/// observed empty, so a concurrent `push` either lands in this drain or
/// triggers a fresh wake.
pub struct Drain<T: Send + 'static> {
    inner: Arc<Inner<T>>,
    finished: bool,
}

impl<T: Send + 'static> Iterator for Drain<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }

        let mut state = self.inner.lock();
        match state.items.pop_front() {
            Some(item) => Some(item),
            None => {
                state.draining = false;
                self.finished = true;
                None
            }
        }
    }
}

impl<T: Send + 'static> Drop for Drain<T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        // Abandoned mid-queue: release the flag and re-wake for leftovers
        let leftovers = {
            let mut state = self.inner.lock();
            state.draining = false;
            !state.items.is_empty() && !state.closed
        };

        if leftovers {
            spawn_wake(&self.inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    const RETRY: Duration = Duration::from_millis(5);

    #[test]
    fn test_drain_yields_fifo_and_empties() {
        let queue = DeferredQueue::new("test", RETRY);
        queue.push(1);
        queue.push(2);
        queue.push(3);

        let items: Vec<_> = queue.drain().unwrap().collect();

        assert_eq!(items, vec![1, 2, 3]);
        assert!(queue.is_empty());
        assert!(!queue.is_draining());
    }

    #[test]
    fn test_only_one_drain_at_a_time() {
        let queue = DeferredQueue::new("test", RETRY);
        queue.push("a");

        let first = queue.drain();
        assert!(first.is_some());
        assert!(queue.drain().is_none());

        drop(first);
        assert!(queue.drain().is_some());
    }

    #[test]
    fn test_push_during_drain_is_observed_by_same_drain() {
        let queue = DeferredQueue::new("test", RETRY);
        queue.push(1);

        let mut drain = queue.drain().unwrap();
        assert_eq!(drain.next(), Some(1));
        queue.push(2);
        assert_eq!(drain.next(), Some(2));
        assert_eq!(drain.next(), None);
    }

    #[test]
    fn test_wake_delivered_after_late_registration() {
        let queue = DeferredQueue::new("test", RETRY);
        queue.push("early");

        let (tx, rx) = mpsc::channel();
        thread::sleep(Duration::from_millis(20));
        queue.register_wake(move || tx.send(()).map_err(|e| WakeError(e.to_string())));

        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
        assert_eq!(queue.drain().unwrap().collect::<Vec<_>>(), vec!["early"]);
    }

    #[test]
    fn test_failed_wake_is_retried() {
        let queue = DeferredQueue::new("test", RETRY);
        let attempts = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();

        let counter = Arc::clone(&attempts);
        queue.register_wake(move || {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(WakeError("not ready".into()));
            }
            tx.send(()).map_err(|e| WakeError(e.to_string()))
        });
        queue.push(7);

        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_no_wake_while_draining() {
        let queue = DeferredQueue::new("test", RETRY);
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        queue.register_wake(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let drain = queue.drain().unwrap();
        queue.push(1);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(wakes.load(Ordering::SeqCst), 0);

        assert_eq!(drain.collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_abandoned_drain_rewakes_for_leftovers() {
        let queue = DeferredQueue::new("test", RETRY);
        queue.push(1);
        queue.push(2);

        let (tx, rx) = mpsc::channel();
        {
            let mut drain = queue.drain().unwrap();
            assert_eq!(drain.next(), Some(1));
            queue.register_wake(move || tx.send(()).map_err(|e| WakeError(e.to_string())));
        }

        // One wake from the initial pushes, one from the abandoned drain
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
        assert!(!queue.is_draining());
        assert_eq!(queue.drain().unwrap().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_closed_queue_stops_retrying() {
        let metrics = Arc::new(Metrics::new());
        let queue = DeferredQueue::with_metrics("test", RETRY, Arc::clone(&metrics));
        queue.push(1);
        thread::sleep(Duration::from_millis(20));
        queue.close();
        thread::sleep(Duration::from_millis(20));

        let retries = metrics.wake_retries.load(Ordering::Relaxed);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(metrics.wake_retries.load(Ordering::Relaxed), retries);
        assert_eq!(queue.len(), 1);
    }
}
