//! Server-Sent Events for refresh progress streaming
//!
//! Streams per-collection ProgressEvents. A client that connects
//! mid-refresh immediately gets a replay of the last known event for
//! the collection, then live events from that point forward. The
//! stream closes itself after a bounded wall-clock duration; closing
//! it does not stop the underlying refresh.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use boardwatch_common::events::Collection;
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Streams close after this long regardless of refresh state
pub const MAX_STREAM_DURATION: Duration = Duration::from_secs(10 * 60);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// GET /events/:collection - SSE progress stream
pub async fn progress_stream(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let collection: Collection = collection
        .parse()
        .map_err(|e: boardwatch_common::Error| ApiError::BadRequest(e.to_string()))?;

    info!(collection = %collection, "New SSE progress subscriber");

    let mut rx = state.progress.subscribe();
    let replay = state.progress.last_event(collection);

    let stream = async_stream::stream! {
        if let Some(event) = replay {
            if let Ok(json) = serde_json::to_string(&event) {
                yield Ok(Event::default().event("progress").data(json));
            }
        }

        let deadline = tokio::time::Instant::now() + MAX_STREAM_DURATION;

        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    debug!(collection = %collection, "SSE stream duration limit reached");
                    break;
                }

                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    yield Ok(Event::default().comment("heartbeat"));
                }

                result = rx.recv() => match result {
                    Ok(event) if event.collection == collection => {
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                yield Ok(Event::default().event("progress").data(json));
                            }
                            Err(e) => {
                                warn!(error = %e, "Failed to serialize progress event");
                            }
                        }
                    }
                    // Events for the other collection
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(collection = %collection, skipped, "SSE subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    };

    Ok(Sse::new(stream))
}
