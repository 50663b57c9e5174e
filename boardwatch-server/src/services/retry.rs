//! Background retry of failed timeline extractions
//!
//! Failed timeline calls land in an in-memory queue (lost on restart)
//! and are retried a few at a time on a fixed tick. Items carry an
//! attempt count; requeues back off exponentially and a max-attempt
//! cutoff moves an item to a terminal abandoned state surfaced through
//! a counter rather than retrying forever.

use crate::services::gateway::InferenceGateway;
use crate::services::inference::CompletionApi;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Seconds between worker ticks
pub const RETRY_TICK_SECS: u64 = 60;
/// Items retried per tick
pub const MAX_PER_TICK: usize = 3;
/// Delay between items within a tick
pub const ITEM_DELAY: Duration = Duration::from_secs(5);
/// Attempts before an item is abandoned
pub const MAX_ATTEMPTS: u32 = 5;
/// Base backoff, doubled per attempt
pub const BACKOFF_BASE_MS: i64 = 60_000;
/// Queue capacity; pushes beyond this are dropped with a warning
pub const QUEUE_CAPACITY: usize = 256;

/// A failed timeline extraction awaiting retry
#[derive(Debug, Clone)]
pub struct RetryItem {
    pub key: String,
    pub title: String,
    pub body: String,
    pub attempts: u32,
    /// Epoch ms before which this item is not due
    pub next_attempt_ms: i64,
}

/// Process-scoped retry queue, shared between the gateway (producer)
/// and the retry worker (consumer)
#[derive(Clone)]
pub struct RetryQueue {
    inner: Arc<Mutex<VecDeque<RetryItem>>>,
    abandoned: Arc<AtomicU64>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            abandoned: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue a freshly failed extraction. Deduplicates by fingerprint
    /// key; drops the item when the queue is at capacity.
    pub fn push_new(&self, key: &str, title: &str, body: &str) {
        let mut queue = self.inner.lock().expect("retry queue poisoned");

        if queue.iter().any(|item| item.key == key) {
            return;
        }
        if queue.len() >= QUEUE_CAPACITY {
            tracing::warn!(key = %key, "Retry queue full, dropping item");
            return;
        }

        queue.push_back(RetryItem {
            key: key.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            attempts: 0,
            next_attempt_ms: 0,
        });
    }

    /// Remove and return up to `max` items that are due at `now_ms`
    pub fn take_due(&self, now_ms: i64, max: usize) -> Vec<RetryItem> {
        let mut queue = self.inner.lock().expect("retry queue poisoned");
        let mut due = Vec::new();
        let mut kept = VecDeque::with_capacity(queue.len());

        while let Some(item) = queue.pop_front() {
            if due.len() < max && item.next_attempt_ms <= now_ms {
                due.push(item);
            } else {
                kept.push_back(item);
            }
        }
        *queue = kept;

        due
    }

    /// Requeue a failed retry with exponential backoff, or abandon it
    /// once the attempt cutoff is reached.
    pub fn requeue_failed(&self, mut item: RetryItem, now_ms: i64) {
        item.attempts += 1;
        if item.attempts >= MAX_ATTEMPTS {
            self.abandoned.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                key = %item.key,
                attempts = item.attempts,
                "Abandoning timeline extraction after repeated failures"
            );
            return;
        }

        item.next_attempt_ms = now_ms + (BACKOFF_BASE_MS << item.attempts);
        let mut queue = self.inner.lock().expect("retry queue poisoned");
        queue.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("retry queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items abandoned after the attempt cutoff (process lifetime)
    pub fn abandoned_count(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }
}

impl Default for RetryQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// One worker tick: drain up to [`MAX_PER_TICK`] due items, re-invoke
/// the timeline path, requeue failures with backoff.
pub async fn run_tick<C: CompletionApi>(
    queue: &RetryQueue,
    gateway: &InferenceGateway<C>,
    item_delay: Duration,
) {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let due = queue.take_due(now_ms, MAX_PER_TICK);
    if due.is_empty() {
        return;
    }

    tracing::info!(count = due.len(), remaining = queue.len(), "Retrying failed extractions");

    for (i, item) in due.into_iter().enumerate() {
        if i > 0 && !item_delay.is_zero() {
            tokio::time::sleep(item_delay).await;
        }

        if gateway.retry_timeline(&item).await {
            tracing::info!(key = %item.key, "Retry succeeded");
        } else {
            queue.requeue_failed(item, chrono::Utc::now().timestamp_millis());
        }
    }
}

/// Spawn the periodic retry worker
pub fn spawn_retry_worker<C>(
    queue: RetryQueue,
    gateway: Arc<InferenceGateway<C>>,
) -> JoinHandle<()>
where
    C: CompletionApi + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(RETRY_TICK_SECS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            run_tick(&queue, &gateway, ITEM_DELAY).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    #[test]
    fn push_deduplicates_by_key() {
        let queue = RetryQueue::new();
        queue.push_new("timeline:a", "Title", "Body");
        queue.push_new("timeline:a", "Title", "Body");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn queue_is_bounded() {
        let queue = RetryQueue::new();
        for i in 0..QUEUE_CAPACITY + 10 {
            queue.push_new(&format!("timeline:{}", i), "t", "b");
        }
        assert_eq!(queue.len(), QUEUE_CAPACITY);
    }

    #[test]
    fn take_due_skips_backed_off_items() {
        let queue = RetryQueue::new();
        queue.push_new("timeline:due", "t", "b");
        queue.requeue_failed(
            RetryItem {
                key: "timeline:later".to_string(),
                title: "t".to_string(),
                body: "b".to_string(),
                attempts: 0,
                next_attempt_ms: 0,
            },
            now_ms(),
        );

        let due = queue.take_due(now_ms(), 10);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].key, "timeline:due");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn take_due_respects_max() {
        let queue = RetryQueue::new();
        for i in 0..5 {
            queue.push_new(&format!("timeline:{}", i), "t", "b");
        }
        let due = queue.take_due(now_ms(), MAX_PER_TICK);
        assert_eq!(due.len(), MAX_PER_TICK);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn backoff_grows_with_attempts() {
        let queue = RetryQueue::new();
        let item = RetryItem {
            key: "timeline:x".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            attempts: 0,
            next_attempt_ms: 0,
        };

        let now = now_ms();
        queue.requeue_failed(item, now);
        let first = queue.take_due(i64::MAX, 1).pop().unwrap();
        assert_eq!(first.attempts, 1);
        assert_eq!(first.next_attempt_ms, now + (BACKOFF_BASE_MS << 1));

        queue.requeue_failed(first, now);
        let second = queue.take_due(i64::MAX, 1).pop().unwrap();
        assert_eq!(second.attempts, 2);
        assert_eq!(second.next_attempt_ms, now + (BACKOFF_BASE_MS << 2));
    }

    #[test]
    fn abandoned_after_max_attempts() {
        let queue = RetryQueue::new();
        let item = RetryItem {
            key: "timeline:x".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            attempts: MAX_ATTEMPTS - 1,
            next_attempt_ms: 0,
        };

        queue.requeue_failed(item, now_ms());
        assert!(queue.is_empty());
        assert_eq!(queue.abandoned_count(), 1);
    }
}
