//! GitHub GraphQL API client
//!
//! Paged retrieval of project board items, open repository issues, and
//! issue comments. All three queries share the `{ nodes, pageInfo }`
//! paging contract. Primary-list pages are capped to bound worst-case
//! latency; comment pagination runs to exhaustion with a small
//! inter-page delay. A failed comment page degrades to whatever was
//! accumulated; a failed primary page propagates to the caller.

use crate::models::Comment;
use boardwatch_common::config::GithubConfig;
use boardwatch_common::events::{Collection, ProgressBus};
use governor::{Quota, RateLimiter};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";
const USER_AGENT: &str = "boardwatch/0.1.0";
/// Page ceiling for project board items
pub const MAX_PROJECT_PAGES: usize = 50;
/// Page ceiling for repository issues
pub const MAX_ISSUE_PAGES: usize = 20;
/// Delay between comment pages to respect upstream rate limits
const COMMENT_PAGE_DELAY: Duration = Duration::from_millis(200);
/// GraphQL requests per second
const RATE_LIMIT_PER_SEC: u32 = 5;

/// GitHub client errors
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed")]
    Auth,

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// The first page of comments fetched inline with a parent record
#[derive(Debug, Clone, Default)]
pub struct CommentPage {
    pub comments: Vec<Comment>,
    pub has_more: bool,
    pub cursor: Option<String>,
}

/// A project board item before enrichment
#[derive(Debug, Clone)]
pub struct RawProjectItem {
    /// Project item node id
    pub id: String,
    /// Empty when the item has no issue content (draft, PR)
    pub title: String,
    /// Content (issue) node id, used for comment pagination
    pub content_id: Option<String>,
    pub url: String,
    pub body: String,
    pub status: Option<String>,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub comments: CommentPage,
}

/// A repository issue before enrichment
#[derive(Debug, Clone)]
pub struct RawIssue {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub comments: CommentPage,
}

const PROJECT_ITEMS_QUERY: &str = r#"
query($org: String!, $number: Int!, $cursor: String) {
  organization(login: $org) {
    projectV2(number: $number) {
      items(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes {
          id
          fieldValueByName(name: "Status") {
            ... on ProjectV2ItemFieldSingleSelectValue { name }
          }
          content {
            ... on Issue {
              id title url body createdAt updatedAt
              labels(first: 20) { nodes { name } }
              assignees(first: 10) { nodes { login } }
              comments(first: 20) {
                pageInfo { hasNextPage endCursor }
                nodes { id author { login } body url createdAt }
              }
            }
          }
        }
      }
    }
  }
}"#;

const OPEN_ISSUES_QUERY: &str = r#"
query($owner: String!, $repo: String!, $cursor: String) {
  repository(owner: $owner, name: $repo) {
    issues(first: 100, after: $cursor, states: OPEN) {
      pageInfo { hasNextPage endCursor }
      nodes {
        id number title url body createdAt updatedAt
        labels(first: 20) { nodes { name } }
        assignees(first: 10) { nodes { login } }
        comments(first: 20) {
          pageInfo { hasNextPage endCursor }
          nodes { id author { login } body url createdAt }
        }
      }
    }
  }
}"#;

const MORE_COMMENTS_QUERY: &str = r#"
query($id: ID!, $cursor: String) {
  node(id: $id) {
    ... on Issue {
      comments(first: 100, after: $cursor) {
        pageInfo { hasNextPage endCursor }
        nodes { id author { login } body url createdAt }
      }
    }
  }
}"#;

/// GitHub GraphQL API client
pub struct GithubClient {
    http_client: reqwest::Client,
    config: GithubConfig,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Result<Self, GithubError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GithubError::Network(e.to_string()))?;

        // Safe: RATE_LIMIT_PER_SEC is non-zero
        let quota = Quota::per_second(std::num::NonZeroU32::new(RATE_LIMIT_PER_SEC).unwrap());

        Ok(Self {
            http_client,
            config,
            rate_limiter: RateLimiter::direct(quota),
        })
    }

    async fn graphql(&self, query: &str, variables: Value) -> Result<Value, GithubError> {
        self.rate_limiter.until_ready().await;

        let response = self
            .http_client
            .post(GITHUB_GRAPHQL_URL)
            .bearer_auth(&self.config.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| GithubError::Network(e.to_string()))?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(GithubError::Auth);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GithubError::Api(status.as_u16(), error_text));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| GithubError::Parse(e.to_string()))?;

        if let Some(errors) = envelope.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages: Vec<String> = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .map(String::from)
                    .collect();
                return Err(GithubError::GraphQl(messages.join("; ")));
            }
        }

        envelope
            .get("data")
            .cloned()
            .ok_or_else(|| GithubError::Parse("response had no data field".to_string()))
    }

    /// Fetch all project board items, up to [`MAX_PROJECT_PAGES`] pages
    pub async fn fetch_project_items(
        &self,
        progress: &ProgressBus,
    ) -> Result<Vec<RawProjectItem>, GithubError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 1..=MAX_PROJECT_PAGES {
            let data = self
                .graphql(
                    PROJECT_ITEMS_QUERY,
                    json!({
                        "org": self.config.project_owner,
                        "number": self.config.project_number,
                        "cursor": cursor,
                    }),
                )
                .await?;

            let (mut page_items, has_more, end_cursor) = parse_project_items_page(&data)?;
            items.append(&mut page_items);
            progress.report(
                Collection::Roadmap,
                format!("Fetched project items page {}", page),
                items.len(),
                0,
            );

            if !has_more {
                return Ok(items);
            }
            cursor = end_cursor;
        }

        tracing::warn!(
            pages = MAX_PROJECT_PAGES,
            "Project item page ceiling reached, truncating fetch"
        );
        Ok(items)
    }

    /// Fetch all open repository issues, up to [`MAX_ISSUE_PAGES`] pages
    pub async fn fetch_open_issues(
        &self,
        progress: &ProgressBus,
    ) -> Result<Vec<RawIssue>, GithubError> {
        let mut issues = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 1..=MAX_ISSUE_PAGES {
            let data = self
                .graphql(
                    OPEN_ISSUES_QUERY,
                    json!({
                        "owner": self.config.owner,
                        "repo": self.config.repo,
                        "cursor": cursor,
                    }),
                )
                .await?;

            let (mut page_issues, has_more, end_cursor) = parse_issues_page(&data)?;
            issues.append(&mut page_issues);
            progress.report(
                Collection::Issues,
                format!("Fetched issues page {}", page),
                issues.len(),
                0,
            );

            if !has_more {
                return Ok(issues);
            }
            cursor = end_cursor;
        }

        tracing::warn!(
            pages = MAX_ISSUE_PAGES,
            "Issue page ceiling reached, truncating fetch"
        );
        Ok(issues)
    }

    /// Page the remaining comments for an issue to exhaustion. A failed
    /// page logs and returns what was accumulated so far.
    pub async fn fetch_all_comments(
        &self,
        content_id: &str,
        known: Vec<Comment>,
        has_more: bool,
        cursor: Option<String>,
    ) -> Vec<Comment> {
        let mut comments = known;
        let mut has_more = has_more;
        let mut cursor = cursor;

        while has_more {
            tokio::time::sleep(COMMENT_PAGE_DELAY).await;

            let data = match self
                .graphql(MORE_COMMENTS_QUERY, json!({ "id": content_id, "cursor": cursor }))
                .await
            {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(
                        content_id = %content_id,
                        error = %e,
                        accumulated = comments.len(),
                        "Comment page fetch failed, returning partial comments"
                    );
                    return comments;
                }
            };

            match parse_comments_page(&data) {
                Ok((mut page_comments, more, end_cursor)) => {
                    comments.append(&mut page_comments);
                    has_more = more;
                    cursor = end_cursor;
                }
                Err(e) => {
                    tracing::warn!(content_id = %content_id, error = %e, "Comment page parse failed");
                    return comments;
                }
            }
        }

        comments
    }
}

fn parse_page_info(v: &Value) -> (bool, Option<String>) {
    let has_more = v
        .pointer("/pageInfo/hasNextPage")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let cursor = v
        .pointer("/pageInfo/endCursor")
        .and_then(Value::as_str)
        .map(String::from);
    (has_more, cursor)
}

fn parse_comment(v: &Value) -> Option<Comment> {
    Some(Comment {
        id: v.get("id")?.as_str()?.to_string(),
        // Deleted accounts come back with a null author
        author: v
            .pointer("/author/login")
            .and_then(Value::as_str)
            .unwrap_or("ghost")
            .to_string(),
        body: v.get("body").and_then(Value::as_str).unwrap_or_default().to_string(),
        url: v.get("url").and_then(Value::as_str).unwrap_or_default().to_string(),
        created_at: v
            .get("createdAt")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())?,
    })
}

fn parse_comment_page(v: &Value) -> CommentPage {
    let comments = v
        .get("nodes")
        .and_then(Value::as_array)
        .map(|nodes| nodes.iter().filter_map(parse_comment).collect())
        .unwrap_or_default();
    let (has_more, cursor) = parse_page_info(v);
    CommentPage {
        comments,
        has_more,
        cursor,
    }
}

fn parse_string_list(v: Option<&Value>, field: &str) -> Vec<String> {
    v.and_then(|v| v.get("nodes"))
        .and_then(Value::as_array)
        .map(|nodes| {
            nodes
                .iter()
                .filter_map(|n| n.get(field).and_then(Value::as_str))
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_datetime(v: Option<&Value>) -> Option<chrono::DateTime<chrono::Utc>> {
    v.and_then(Value::as_str).and_then(|s| s.parse().ok())
}

pub(crate) fn parse_project_items_page(
    data: &Value,
) -> Result<(Vec<RawProjectItem>, bool, Option<String>), GithubError> {
    let items_obj = data
        .pointer("/organization/projectV2/items")
        .ok_or_else(|| GithubError::Parse("missing projectV2 items".to_string()))?;

    let (has_more, cursor) = parse_page_info(items_obj);

    let nodes = items_obj
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| GithubError::Parse("missing item nodes".to_string()))?;

    let items = nodes
        .iter()
        .map(|node| {
            let content = node.get("content").filter(|c| !c.is_null());
            let get = |field: &str| -> String {
                content
                    .and_then(|c| c.get(field))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };

            RawProjectItem {
                id: node
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                title: get("title"),
                content_id: content
                    .and_then(|c| c.get("id"))
                    .and_then(Value::as_str)
                    .map(String::from),
                url: get("url"),
                body: get("body"),
                status: node
                    .pointer("/fieldValueByName/name")
                    .and_then(Value::as_str)
                    .map(String::from),
                labels: parse_string_list(content.and_then(|c| c.get("labels")), "name"),
                assignees: parse_string_list(content.and_then(|c| c.get("assignees")), "login"),
                created_at: parse_datetime(content.and_then(|c| c.get("createdAt"))),
                updated_at: parse_datetime(content.and_then(|c| c.get("updatedAt"))),
                comments: content
                    .and_then(|c| c.get("comments"))
                    .map(parse_comment_page)
                    .unwrap_or_default(),
            }
        })
        .collect();

    Ok((items, has_more, cursor))
}

pub(crate) fn parse_issues_page(
    data: &Value,
) -> Result<(Vec<RawIssue>, bool, Option<String>), GithubError> {
    let issues_obj = data
        .pointer("/repository/issues")
        .ok_or_else(|| GithubError::Parse("missing repository issues".to_string()))?;

    let (has_more, cursor) = parse_page_info(issues_obj);

    let nodes = issues_obj
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| GithubError::Parse("missing issue nodes".to_string()))?;

    let issues = nodes
        .iter()
        .map(|node| {
            let get = |field: &str| -> String {
                node.get(field)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };

            RawIssue {
                id: get("id"),
                number: node.get("number").and_then(Value::as_u64).unwrap_or(0),
                title: get("title"),
                url: get("url"),
                body: get("body"),
                labels: parse_string_list(node.get("labels"), "name"),
                assignees: parse_string_list(node.get("assignees"), "login"),
                created_at: parse_datetime(node.get("createdAt")),
                updated_at: parse_datetime(node.get("updatedAt")),
                comments: node
                    .get("comments")
                    .map(parse_comment_page)
                    .unwrap_or_default(),
            }
        })
        .collect();

    Ok((issues, has_more, cursor))
}

pub(crate) fn parse_comments_page(
    data: &Value,
) -> Result<(Vec<Comment>, bool, Option<String>), GithubError> {
    let comments_obj = data
        .pointer("/node/comments")
        .ok_or_else(|| GithubError::Parse("missing node comments".to_string()))?;

    let page = parse_comment_page(comments_obj);
    Ok((page.comments, page.has_more, page.cursor))
}
