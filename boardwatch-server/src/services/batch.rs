//! Batch-barrier concurrency
//!
//! Items are processed in fixed-size groups; a group is awaited in
//! full before the next one starts. This bounds peak in-flight calls
//! against both upstreams deterministically and keeps results in
//! submission order, because each group's results are collected per
//! slot rather than per completion.

use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Concurrent items per batch
pub const BATCH_SIZE: usize = 6;

/// Run `f` over `items` in batches of `batch_size`. The closure gets
/// the item's submission index; returning `None` drops the item from
/// the output (order of the survivors is preserved). The cancellation
/// token is checked between batches only; an in-flight batch always
/// runs to completion.
pub async fn process_in_batches<T, R, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    cancel: &CancellationToken,
    mut f: F,
) -> Vec<R>
where
    F: FnMut(usize, T) -> Fut,
    Fut: Future<Output = Option<R>>,
{
    let mut results = Vec::with_capacity(items.len());
    let mut iter = items.into_iter();
    let mut index = 0;

    loop {
        if cancel.is_cancelled() {
            tracing::info!(processed = index, "Batch processing cancelled");
            break;
        }

        let batch: Vec<_> = iter.by_ref().take(batch_size).collect();
        if batch.is_empty() {
            break;
        }

        let futures: Vec<_> = batch
            .into_iter()
            .map(|item| {
                let fut = f(index, item);
                index += 1;
                fut
            })
            .collect();

        let batch_results = futures::future::join_all(futures).await;
        results.extend(batch_results.into_iter().flatten());
    }

    results
}
