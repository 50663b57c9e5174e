//! Inference gateway: cache-or-call policy over the inference API
//!
//! Three extraction tasks share one policy: fingerprint the input,
//! consult the durable cache, and only call the inference API when the
//! cache has no fresh answer. Successes are cached for
//! [`SUCCESS_TTL_MS`]; failures are cached too, and a short
//! [`FAILURE_COOLDOWN_MS`] window suppresses repeat calls against an
//! erroring upstream. Failed timeline extractions additionally land on
//! the retry queue.
//!
//! Upstream and parse failures never propagate as errors from here:
//! callers get the failure sentinel or `None` through the normal data
//! channel. Cache store errors at runtime are logged and treated as
//! misses.

use crate::db::cache::{self, CacheEntry};
use crate::models::{Comment, Eta, IssueAnalysis};
use crate::services::inference::CompletionApi;
use crate::services::retry::{RetryItem, RetryQueue};
use boardwatch_common::fingerprint::fingerprint;
use serde::Deserialize;
use sqlx::SqlitePool;

/// Successful results are served from cache for 24 hours
pub const SUCCESS_TTL_MS: i64 = 24 * 60 * 60 * 1000;
/// Failed entries suppress new calls for 60 seconds
pub const FAILURE_COOLDOWN_MS: i64 = 60_000;
/// Sentinel returned through the data channel when extraction failed
pub const EXTRACTION_FAILED: &str = "extraction failed";

/// Placeholder attribution when no source comment matches
const UNATTRIBUTED: &str = "a maintainer";

/// What the cache says about an upcoming inference call
#[derive(Debug, PartialEq)]
enum Decision {
    /// Unexpired success: serve this without calling
    Fresh(String),
    /// Recent failure: return the sentinel without calling
    Cooldown,
    /// Miss, expired success, or stale failure: call the API
    Call,
}

fn decide(entry: Option<&CacheEntry>, now_ms: i64) -> Decision {
    match entry {
        None => Decision::Call,
        Some(e) if !e.failed => match &e.result {
            Some(result) if e.age_ms(now_ms) < SUCCESS_TTL_MS => Decision::Fresh(result.clone()),
            _ => Decision::Call,
        },
        Some(e) if e.age_ms(now_ms) < FAILURE_COOLDOWN_MS => Decision::Cooldown,
        Some(_) => Decision::Call,
    }
}

/// Strip a markdown code fence wrapper, if present, before JSON parsing.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

/// Keep only comments written by the record's own assignees; outsider
/// commentary is excluded from prompt context.
fn assignee_comments<'a>(comments: &'a [Comment], assignees: &[String]) -> Vec<&'a Comment> {
    comments
        .iter()
        .filter(|c| assignees.iter().any(|a| a.eq_ignore_ascii_case(&c.author)))
        .collect()
}

/// Best-effort reverse mapping from an extracted snippet to its source
/// comment. Substring containment in either direction; misattribution
/// on shared boilerplate is accepted.
fn attribute_eta(text: &str, comments: &[&Comment]) -> (String, String) {
    let needle = text.trim();
    if !needle.is_empty() {
        for comment in comments {
            let body = comment.body.trim();
            // An empty body would match any snippet via contains("")
            if body.is_empty() {
                continue;
            }
            if comment.body.contains(needle) || needle.contains(body) {
                return (comment.author.clone(), comment.url.clone());
            }
        }
    }
    let url = comments.first().map(|c| c.url.clone()).unwrap_or_default();
    (UNATTRIBUTED.to_string(), url)
}

#[derive(Debug, Deserialize)]
struct EtaResponse {
    date: Option<String>,
    text: String,
}

/// Cache-fronted inference gateway
pub struct InferenceGateway<C: CompletionApi> {
    api: C,
    db: SqlitePool,
    retry: RetryQueue,
}

impl<C: CompletionApi> InferenceGateway<C> {
    pub fn new(api: C, db: SqlitePool, retry: RetryQueue) -> Self {
        Self { api, db, retry }
    }

    /// Extract a customer-facing timeline string from an item body.
    ///
    /// Empty bodies short-circuit to `None` without touching the cache.
    /// A failure (fresh or within cooldown) yields the
    /// [`EXTRACTION_FAILED`] sentinel.
    pub async fn extract_timeline(&self, title: &str, body: &str) -> Option<String> {
        if body.trim().is_empty() {
            return None;
        }

        let key = fingerprint("timeline", &[title, body]);
        match decide(self.lookup(&key).await.as_ref(), now_ms()) {
            Decision::Fresh(result) => Some(result),
            Decision::Cooldown => Some(EXTRACTION_FAILED.to_string()),
            Decision::Call => Some(
                self.call_timeline(&key, title, body, true)
                    .await
                    .unwrap_or_else(|| EXTRACTION_FAILED.to_string()),
            ),
        }
    }

    /// Retry path used by the background worker: bypasses the cooldown
    /// check and does not re-enqueue on failure (the worker handles
    /// backoff). Returns whether the call succeeded.
    pub async fn retry_timeline(&self, item: &RetryItem) -> bool {
        self.call_timeline(&item.key, &item.title, &item.body, false)
            .await
            .is_some()
    }

    /// `None` means the call failed and was recorded as such; the
    /// response text is never inspected for failure.
    async fn call_timeline(
        &self,
        key: &str,
        title: &str,
        body: &str,
        enqueue: bool,
    ) -> Option<String> {
        let system = "You extract customer-facing timeline statements from GitHub issue text. \
                      Reply with a short phrase such as a quarter, month, or release name. \
                      Reply with the word none if no timeline is stated.";
        let user = format!("Title: {}\n\nBody:\n{}", title, body);

        match self.api.complete(system, &user).await {
            Ok(response) => {
                let result = response.trim().to_string();
                self.store(key, Some(&result), false).await;
                Some(result)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Timeline extraction failed");
                self.store(key, None, true).await;
                if enqueue {
                    self.retry.push_new(key, title, body);
                }
                None
            }
        }
    }

    /// Extract an ETA from maintainer comments, attributed back to the
    /// most likely source comment. Only comments authored by the
    /// record's assignees are sent to the model.
    pub async fn extract_eta(
        &self,
        title: &str,
        comments: &[Comment],
        assignees: &[String],
    ) -> Option<Eta> {
        let maintainer_comments = assignee_comments(comments, assignees);
        if maintainer_comments.is_empty() {
            return None;
        }

        let context = maintainer_comments
            .iter()
            .map(|c| format!("{}: {}", c.author, c.body))
            .collect::<Vec<_>>()
            .join("\n---\n");

        let key = fingerprint("eta", &[title, &context]);
        match decide(self.lookup(&key).await.as_ref(), now_ms()) {
            // "null" is a cached success meaning the model found no ETA
            Decision::Fresh(result) if result == "null" => None,
            Decision::Fresh(result) => match serde_json::from_str::<Eta>(&result) {
                Ok(eta) => Some(eta),
                Err(e) => {
                    // Cached shape drifted; fall through to a fresh call
                    tracing::warn!(key = %key, error = %e, "Discarding unreadable cached ETA");
                    self.call_eta(&key, title, &maintainer_comments, &context).await
                }
            },
            Decision::Cooldown => None,
            Decision::Call => self.call_eta(&key, title, &maintainer_comments, &context).await,
        }
    }

    async fn call_eta(
        &self,
        key: &str,
        title: &str,
        maintainer_comments: &[&Comment],
        context: &str,
    ) -> Option<Eta> {
        let system = "You find delivery ETAs stated by maintainers in issue comments. \
                      Reply with JSON: {\"date\": \"YYYY-MM-DD or null\", \"text\": \
                      \"the exact sentence stating the ETA\"}. \
                      Reply with {\"date\": null, \"text\": \"\"} if no ETA is stated.";
        let user = format!("Issue: {}\n\nMaintainer comments:\n{}", title, context);

        match self.api.complete(system, &user).await {
            Ok(response) => {
                let stripped = strip_code_fences(&response);
                match serde_json::from_str::<EtaResponse>(stripped) {
                    Ok(parsed) if !parsed.text.is_empty() => {
                        let (author, url) = attribute_eta(&parsed.text, maintainer_comments);
                        let eta = Eta {
                            date: parsed.date,
                            text: parsed.text,
                            author,
                            url,
                        };
                        let serialized = serde_json::to_string(&eta).ok()?;
                        self.store(key, Some(&serialized), false).await;
                        Some(eta)
                    }
                    Ok(_) => {
                        // Model found no ETA; cache the absence as a success
                        self.store(key, Some("null"), false).await;
                        None
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "ETA response was not valid JSON");
                        self.store(key, None, true).await;
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "ETA extraction failed");
                self.store(key, None, true).await;
                None
            }
        }
    }

    /// Summarize an issue: current status, next steps, classification.
    /// Prompt context is the body plus assignee-authored comments only.
    pub async fn analyze_issue(
        &self,
        title: &str,
        body: &str,
        comments: &[Comment],
        assignees: &[String],
    ) -> Option<IssueAnalysis> {
        if body.trim().is_empty() {
            return None;
        }

        let maintainer_comments = assignee_comments(comments, assignees);
        let context = maintainer_comments
            .iter()
            .map(|c| format!("{}: {}", c.author, c.body))
            .collect::<Vec<_>>()
            .join("\n---\n");

        let key = fingerprint("analysis", &[title, body, &context]);
        match decide(self.lookup(&key).await.as_ref(), now_ms()) {
            Decision::Fresh(result) => match serde_json::from_str::<IssueAnalysis>(&result) {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding unreadable cached analysis");
                    self.call_analysis(&key, title, body, &context).await
                }
            },
            Decision::Cooldown => None,
            Decision::Call => self.call_analysis(&key, title, body, &context).await,
        }
    }

    async fn call_analysis(
        &self,
        key: &str,
        title: &str,
        body: &str,
        context: &str,
    ) -> Option<IssueAnalysis> {
        let system = "You summarize GitHub issues for a support dashboard. Reply with JSON: \
                      {\"currentStatus\": \"...\", \"nextSteps\": \"...\", \"analysis\": \
                      {\"isKnownIssue\": bool, \"isExpectedBehaviour\": bool, \"shouldClose\": bool}}";
        let user = format!(
            "Title: {}\n\nBody:\n{}\n\nMaintainer comments:\n{}",
            title, body, context
        );

        match self.api.complete(system, &user).await {
            Ok(response) => {
                let stripped = strip_code_fences(&response);
                match serde_json::from_str::<IssueAnalysis>(stripped) {
                    Ok(analysis) => {
                        let serialized = serde_json::to_string(&analysis).ok()?;
                        self.store(key, Some(&serialized), false).await;
                        Some(analysis)
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Analysis response was not valid JSON");
                        self.store(key, None, true).await;
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Issue analysis failed");
                self.store(key, None, true).await;
                None
            }
        }
    }

    /// Cache read; a store error at runtime is logged and treated as a miss.
    async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        match cache::get_inference(&self.db, key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Cache write; a store error is logged, the result still flows to the caller.
    async fn store(&self, key: &str, result: Option<&str>, failed: bool) {
        if let Err(e) = cache::put_inference(&self.db, key, result, failed).await {
            tracing::error!(key = %key, error = %e, "Cache write failed");
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::services::inference::InferenceError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted completion backend: pops responses in order, records
    /// the prompts it was sent.
    #[derive(Default)]
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<String, InferenceError>>>,
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedApi {
        fn with_responses(responses: Vec<Result<String, InferenceError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Default::default()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    impl CompletionApi for ScriptedApi {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(user.to_string());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(InferenceError::Network("script exhausted".to_string())))
        }
    }

    async fn gateway_with(
        responses: Vec<Result<String, InferenceError>>,
    ) -> (InferenceGateway<ScriptedApi>, RetryQueue, SqlitePool) {
        let pool = test_pool().await;
        let retry = RetryQueue::new();
        let gateway = InferenceGateway::new(
            ScriptedApi::with_responses(responses),
            pool.clone(),
            retry.clone(),
        );
        (gateway, retry, pool)
    }

    async fn backdate(pool: &SqlitePool, delta_ms: i64) {
        sqlx::query("UPDATE inference_cache SET timestamp = timestamp - ?")
            .bind(delta_ms)
            .execute(pool)
            .await
            .unwrap();
    }

    fn comment(author: &str, body: &str, url: &str) -> Comment {
        Comment {
            id: format!("c-{}", url),
            author: author.to_string(),
            body: body.to_string(),
            url: url.to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_identical_call_is_served_from_cache() {
        let (gateway, _, _) =
            gateway_with(vec![Ok("Q3 2026".to_string()), Ok("SHOULD NOT BE USED".to_string())])
                .await;

        let first = gateway.extract_timeline("Add GPU support", "Planned for Q3 2026").await;
        let second = gateway.extract_timeline("Add GPU support", "Planned for Q3 2026").await;

        assert_eq!(first.as_deref(), Some("Q3 2026"));
        assert_eq!(first, second);
        assert_eq!(gateway.api.call_count(), 1);
    }

    #[tokio::test]
    async fn expired_success_triggers_a_new_call() {
        let (gateway, _, pool) =
            gateway_with(vec![Ok("Q3 2026".to_string()), Ok("Q4 2026".to_string())]).await;

        gateway.extract_timeline("t", "body").await;
        backdate(&pool, SUCCESS_TTL_MS + 1000).await;

        let result = gateway.extract_timeline("t", "body").await;
        assert_eq!(result.as_deref(), Some("Q4 2026"));
        assert_eq!(gateway.api.call_count(), 2);
    }

    #[tokio::test]
    async fn recent_failure_returns_sentinel_without_calling() {
        let (gateway, _, _) = gateway_with(vec![
            Err(InferenceError::Api(500, "boom".to_string())),
        ])
        .await;

        let first = gateway.extract_timeline("t", "body").await;
        assert_eq!(first.as_deref(), Some(EXTRACTION_FAILED));
        assert_eq!(gateway.api.call_count(), 1);

        // Inside the cooldown: sentinel, no new call
        let second = gateway.extract_timeline("t", "body").await;
        assert_eq!(second.as_deref(), Some(EXTRACTION_FAILED));
        assert_eq!(gateway.api.call_count(), 1);
    }

    #[tokio::test]
    async fn stale_failure_calls_again() {
        let (gateway, _, pool) = gateway_with(vec![
            Err(InferenceError::Network("down".to_string())),
            Ok("June 2026".to_string()),
        ])
        .await;

        gateway.extract_timeline("t", "body").await;
        backdate(&pool, FAILURE_COOLDOWN_MS + 1000).await;

        let result = gateway.extract_timeline("t", "body").await;
        assert_eq!(result.as_deref(), Some("June 2026"));
        assert_eq!(gateway.api.call_count(), 2);
    }

    #[tokio::test]
    async fn empty_body_skips_cache_and_call() {
        let (gateway, _, pool) = gateway_with(vec![]).await;

        let result = gateway.extract_timeline("t", "   ").await;
        assert!(result.is_none());
        assert_eq!(gateway.api.call_count(), 0);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM inference_cache")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn timeline_failure_lands_on_retry_queue() {
        let (gateway, retry, _) = gateway_with(vec![
            Err(InferenceError::Api(429, "rate limited".to_string())),
        ])
        .await;

        gateway.extract_timeline("Add GPU support", "body text").await;
        assert_eq!(retry.len(), 1);
    }

    #[tokio::test]
    async fn retry_path_succeeds_and_does_not_reenqueue() {
        let (gateway, retry, _) = gateway_with(vec![
            Err(InferenceError::Network("down".to_string())),
            Ok("Q1 2027".to_string()),
        ])
        .await;

        gateway.extract_timeline("t", "body").await;
        let item = retry.take_due(chrono::Utc::now().timestamp_millis(), 1).pop().unwrap();

        assert!(gateway.retry_timeline(&item).await);
        assert!(retry.is_empty());

        // Cache now holds the retry's success; no further API call
        let cached = gateway.extract_timeline("t", "body").await;
        assert_eq!(cached.as_deref(), Some("Q1 2027"));
        assert_eq!(gateway.api.call_count(), 2);
    }

    #[tokio::test]
    async fn retry_accepts_literal_failure_phrase_as_success() {
        let (gateway, retry, _) = gateway_with(vec![
            Err(InferenceError::Network("down".to_string())),
            Ok("extraction failed".to_string()),
        ])
        .await;

        gateway.extract_timeline("t", "body").await;
        let item = retry.take_due(chrono::Utc::now().timestamp_millis(), 1).pop().unwrap();

        // The model really answered with that phrase; the call succeeded
        assert!(gateway.retry_timeline(&item).await);

        let cached = gateway.extract_timeline("t", "body").await;
        assert_eq!(cached.as_deref(), Some("extraction failed"));
        assert_eq!(gateway.api.call_count(), 2);
    }

    #[tokio::test]
    async fn eta_prompt_excludes_outsider_comments() {
        let (gateway, _, _) = gateway_with(vec![Ok(
            r#"{"date": "2026-09-01", "text": "shipping by September 1"}"#.to_string(),
        )])
        .await;

        let comments = vec![
            comment("customer", "any update on this?", "https://example.com/c/1"),
            comment("maintainer", "shipping by September 1", "https://example.com/c/2"),
        ];
        let assignees = vec!["maintainer".to_string()];

        let eta = gateway.extract_eta("Add GPU support", &comments, &assignees).await.unwrap();

        assert!(!gateway.api.last_prompt().contains("any update on this?"));
        assert_eq!(eta.date.as_deref(), Some("2026-09-01"));
        assert_eq!(eta.author, "maintainer");
        assert_eq!(eta.url, "https://example.com/c/2");
    }

    #[tokio::test]
    async fn eta_without_maintainer_comments_is_skipped() {
        let (gateway, _, _) = gateway_with(vec![]).await;
        let comments = vec![comment("customer", "ping", "https://example.com/c/1")];
        let eta = gateway
            .extract_eta("t", &comments, &["maintainer".to_string()])
            .await;
        assert!(eta.is_none());
        assert_eq!(gateway.api.call_count(), 0);
    }

    #[tokio::test]
    async fn absent_eta_is_cached_as_success() {
        let (gateway, _, _) = gateway_with(vec![Ok(
            r#"{"date": null, "text": ""}"#.to_string(),
        )])
        .await;

        let comments = vec![comment("maintainer", "looking into it", "https://example.com/c/1")];
        let assignees = vec!["maintainer".to_string()];

        assert!(gateway.extract_eta("t", &comments, &assignees).await.is_none());
        assert!(gateway.extract_eta("t", &comments, &assignees).await.is_none());
        // Second call served from cache, not from a repeat API call
        assert_eq!(gateway.api.call_count(), 1);
    }

    #[tokio::test]
    async fn eta_attribution_falls_back_to_first_comment() {
        let (gateway, _, _) = gateway_with(vec![Ok(
            r#"{"date": null, "text": "sometime next quarter maybe"}"#.to_string(),
        )])
        .await;

        let comments = vec![
            comment("maintainer", "we are looking into it", "https://example.com/c/1"),
            comment("maintainer", "no commitments yet", "https://example.com/c/2"),
        ];
        let eta = gateway
            .extract_eta("t", &comments, &["maintainer".to_string()])
            .await
            .unwrap();

        assert_eq!(eta.author, UNATTRIBUTED);
        assert_eq!(eta.url, "https://example.com/c/1");
    }

    #[test]
    fn attribution_skips_empty_bodied_comments() {
        let empty = comment("bot", "   ", "https://example.com/c/1");
        let real = comment("maintainer", "landing in June", "https://example.com/c/2");
        let comments = vec![&empty, &real];

        let (author, url) = attribute_eta("landing in June", &comments);
        assert_eq!(author, "maintainer");
        assert_eq!(url, "https://example.com/c/2");
    }

    #[tokio::test]
    async fn analysis_parses_fenced_json() {
        let (gateway, _, _) = gateway_with(vec![Ok("```json\n{\"currentStatus\": \"In progress\", \
             \"nextSteps\": \"Awaiting review\", \"analysis\": {\"isKnownIssue\": true, \
             \"isExpectedBehaviour\": false, \"shouldClose\": false}}\n```"
            .to_string())])
        .await;

        let analysis = gateway
            .analyze_issue("t", "body", &[], &[])
            .await
            .unwrap();
        assert_eq!(analysis.current_status, "In progress");
        assert!(analysis.analysis.is_known_issue);
        assert!(!analysis.analysis.should_close);
    }

    #[tokio::test]
    async fn malformed_analysis_is_cached_as_failed() {
        let (gateway, _, pool) =
            gateway_with(vec![Ok("I cannot answer that.".to_string())]).await;

        let analysis = gateway.analyze_issue("t", "body", &[], &[]).await;
        assert!(analysis.is_none());

        let failed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inference_cache WHERE failed = 1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(failed, 1);

        // Within the cooldown, no second call is made
        gateway.analyze_issue("t", "body", &[], &[]).await;
        assert_eq!(gateway.api.call_count(), 1);
    }

    #[test]
    fn strip_code_fences_variants() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  ```json\n{\"a\":1}\n```  "), "{\"a\":1}");
    }

    #[test]
    fn decide_boundaries() {
        let now = 1_000_000_000;
        let success = CacheEntry {
            key: "k".to_string(),
            result: Some("r".to_string()),
            timestamp: now - SUCCESS_TTL_MS + 1,
            failed: false,
        };
        assert_eq!(decide(Some(&success), now), Decision::Fresh("r".to_string()));

        let expired = CacheEntry {
            timestamp: now - SUCCESS_TTL_MS - 1,
            ..success.clone()
        };
        assert_eq!(decide(Some(&expired), now), Decision::Call);

        let failed_recent = CacheEntry {
            key: "k".to_string(),
            result: None,
            timestamp: now - FAILURE_COOLDOWN_MS + 1,
            failed: true,
        };
        assert_eq!(decide(Some(&failed_recent), now), Decision::Cooldown);

        let failed_stale = CacheEntry {
            timestamp: now - FAILURE_COOLDOWN_MS - 1,
            ..failed_recent.clone()
        };
        assert_eq!(decide(Some(&failed_stale), now), Decision::Call);

        assert_eq!(decide(None, now), Decision::Call);
    }
}
