//! HTTP API for the dashboard client

mod handlers;
mod sse;

pub use handlers::{get_cache_info, get_issues, get_roadmap, health};
pub use sse::progress_stream;
