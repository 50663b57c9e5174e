//! Service layer: upstream clients, enrichment pipeline, background work

pub mod batch;
pub mod gateway;
pub mod github;
pub mod inference;
pub mod orchestrator;
pub mod refresh;
pub mod retry;
pub mod sweeper;

pub use gateway::InferenceGateway;
pub use github::GithubClient;
pub use inference::OpenAiCompletions;
pub use orchestrator::Orchestrator;
pub use refresh::RefreshCoordinator;
pub use retry::{spawn_retry_worker, RetryQueue};
pub use sweeper::spawn_cache_sweeper;
