//! Dashboard record types
//!
//! Normalized GitHub records plus the LLM-derived annotation fields.
//! Serialized names follow the shape the browser client consumes
//! (camelCase).

use serde::{Deserialize, Serialize};

/// A single issue or project-item comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub url: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// ETA extracted from maintainer comments, attributed back to the
/// comment it most likely came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eta {
    /// Date string as stated by the maintainer, when one was given
    pub date: Option<String>,
    /// The text snippet the model extracted
    pub text: String,
    /// Author of the source comment (best-effort attribution)
    pub author: String,
    /// URL of the source comment (best-effort attribution)
    pub url: String,
}

/// Classification flags inside an issue analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFlags {
    pub is_known_issue: bool,
    pub is_expected_behaviour: bool,
    pub should_close: bool,
}

/// LLM-derived status/next-steps/classification summary for an issue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueAnalysis {
    pub current_status: String,
    pub next_steps: String,
    pub analysis: AnalysisFlags,
}

/// Enriched project board item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub body: String,
    pub status: Option<String>,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Customer-facing timeline string extracted from the body, or the
    /// failure sentinel when extraction failed
    pub extracted_date: Option<String>,
    pub last_comment: Option<Comment>,
    pub needs_response: bool,
}

/// Enriched repository issue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub extracted_eta: Option<Eta>,
    pub ai_summary: Option<IssueAnalysis>,
    pub last_comment: Option<Comment>,
    pub needs_response: bool,
}

/// Cache metadata returned to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub last_updated: Option<String>,
    pub is_cached: bool,
}

/// Sort comments newest-first by creation time.
pub fn sort_newest_first(comments: &mut [Comment]) {
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// A record needs a response iff its most recent comment was written by
/// someone outside its assignee set. Zero comments means nothing to
/// respond to.
pub fn needs_response(last_comment: Option<&Comment>, assignees: &[String]) -> bool {
    match last_comment {
        Some(comment) => !assignees
            .iter()
            .any(|a| a.eq_ignore_ascii_case(&comment.author)),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn comment(author: &str, age_hours: i64) -> Comment {
        Comment {
            id: format!("c-{}-{}", author, age_hours),
            author: author.to_string(),
            body: "text".to_string(),
            url: "https://example.com/c/1".to_string(),
            created_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    #[test]
    fn newest_first_ordering() {
        let mut comments = vec![comment("a", 5), comment("b", 1), comment("c", 10)];
        sort_newest_first(&mut comments);
        let authors: Vec<_> = comments.iter().map(|c| c.author.as_str()).collect();
        assert_eq!(authors, vec!["b", "a", "c"]);
    }

    #[test]
    fn assignee_last_comment_needs_no_response() {
        let last = comment("maintainer", 1);
        let assignees = vec!["maintainer".to_string()];
        assert!(!needs_response(Some(&last), &assignees));
    }

    #[test]
    fn outsider_last_comment_needs_response() {
        let last = comment("customer", 1);
        let assignees = vec!["maintainer".to_string()];
        assert!(needs_response(Some(&last), &assignees));
    }

    #[test]
    fn no_comments_needs_no_response() {
        assert!(!needs_response(None, &["maintainer".to_string()]));
    }

    #[test]
    fn assignee_match_ignores_case() {
        let last = comment("Maintainer", 1);
        let assignees = vec!["maintainer".to_string()];
        assert!(!needs_response(Some(&last), &assignees));
    }
}
