//! Enrichment orchestrator
//!
//! Fans bounded-concurrency enrichment out over a fetched batch of
//! records: completes comment pagination where the inline page was
//! truncated, derives `last_comment`/`needs_response`, and invokes the
//! inference gateway for the collection's extraction tasks. One
//! progress event is emitted per item as it starts.

use crate::models::{needs_response, sort_newest_first, Comment, Issue, RoadmapItem};
use crate::services::batch::{process_in_batches, BATCH_SIZE};
use crate::services::gateway::InferenceGateway;
use crate::services::github::{GithubClient, RawIssue, RawProjectItem};
use crate::services::inference::CompletionApi;
use boardwatch_common::events::{Collection, ProgressBus};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Orchestrator<C: CompletionApi> {
    github: Arc<GithubClient>,
    gateway: Arc<InferenceGateway<C>>,
    progress: ProgressBus,
}

impl<C: CompletionApi> Orchestrator<C> {
    pub fn new(
        github: Arc<GithubClient>,
        gateway: Arc<InferenceGateway<C>>,
        progress: ProgressBus,
    ) -> Self {
        Self {
            github,
            gateway,
            progress,
        }
    }

    /// Enrich project board items. Output preserves input order;
    /// items without an identifiable title are dropped.
    pub async fn enrich_roadmap(
        &self,
        items: Vec<RawProjectItem>,
        cancel: &CancellationToken,
    ) -> Vec<RoadmapItem> {
        let total = items.len();
        self.progress
            .report(Collection::Roadmap, "Filtering project items", 0, total);

        process_in_batches(items, BATCH_SIZE, cancel, |index, raw| {
            self.enrich_roadmap_item(index, total, raw)
        })
        .await
    }

    async fn enrich_roadmap_item(
        &self,
        index: usize,
        total: usize,
        raw: RawProjectItem,
    ) -> Option<RoadmapItem> {
        if raw.title.trim().is_empty() {
            tracing::debug!(item_id = %raw.id, "Dropping project item without a title");
            return None;
        }

        self.progress.report(
            Collection::Roadmap,
            format!("Enriching {}", raw.title),
            index + 1,
            total,
        );

        let mut comments = self.complete_comments(&raw.content_id, &raw.comments).await;
        sort_newest_first(&mut comments);
        let last_comment = comments.first().cloned();
        let needs = needs_response(last_comment.as_ref(), &raw.assignees);

        let extracted_date = self.gateway.extract_timeline(&raw.title, &raw.body).await;

        Some(RoadmapItem {
            id: raw.id,
            title: raw.title,
            url: raw.url,
            body: raw.body,
            status: raw.status,
            labels: raw.labels,
            assignees: raw.assignees,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            extracted_date,
            last_comment,
            needs_response: needs,
        })
    }

    /// Enrich repository issues. Same ordering and drop semantics as
    /// the roadmap path.
    pub async fn enrich_issues(
        &self,
        issues: Vec<RawIssue>,
        cancel: &CancellationToken,
    ) -> Vec<Issue> {
        let total = issues.len();
        self.progress
            .report(Collection::Issues, "Filtering issues", 0, total);

        process_in_batches(issues, BATCH_SIZE, cancel, |index, raw| {
            self.enrich_issue(index, total, raw)
        })
        .await
    }

    async fn enrich_issue(&self, index: usize, total: usize, raw: RawIssue) -> Option<Issue> {
        if raw.title.trim().is_empty() {
            tracing::debug!(issue_id = %raw.id, "Dropping issue without a title");
            return None;
        }

        self.progress.report(
            Collection::Issues,
            format!("Enriching #{} {}", raw.number, raw.title),
            index + 1,
            total,
        );

        let content_id = Some(raw.id.clone());
        let mut comments = self.complete_comments(&content_id, &raw.comments).await;
        sort_newest_first(&mut comments);
        let last_comment = comments.first().cloned();
        let needs = needs_response(last_comment.as_ref(), &raw.assignees);

        let extracted_eta = self
            .gateway
            .extract_eta(&raw.title, &comments, &raw.assignees)
            .await;
        let ai_summary = self
            .gateway
            .analyze_issue(&raw.title, &raw.body, &comments, &raw.assignees)
            .await;

        Some(Issue {
            id: raw.id,
            number: raw.number,
            title: raw.title,
            url: raw.url,
            body: raw.body,
            labels: raw.labels,
            assignees: raw.assignees,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            extracted_eta,
            ai_summary,
            last_comment,
            needs_response: needs,
        })
    }

    /// Page out the rest of the comments when the inline first page was
    /// truncated; otherwise the inline page is already complete.
    async fn complete_comments(
        &self,
        content_id: &Option<String>,
        page: &crate::services::github::CommentPage,
    ) -> Vec<Comment> {
        match content_id {
            Some(id) if page.has_more => {
                self.github
                    .fetch_all_comments(id, page.comments.clone(), true, page.cursor.clone())
                    .await
            }
            _ => page.comments.clone(),
        }
    }
}
