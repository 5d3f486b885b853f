use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow phase assigned to a pull request. Phases are mutually
/// exclusive; there are no combined states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Draft awaiting review kickoff.
    Phase1,
    /// Review feedback needs fixes.
    Phase2,
    /// Ready for human review/merge.
    Phase3,
    /// An automated agent is actively processing the PR.
    LlmWorking,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Phase1 => "phase1",
            Phase::Phase2 => "phase2",
            Phase::Phase3 => "phase3",
            Phase::LlmWorking => "LLM working",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review states as GraphQL returns them (UPPERCASE on the wire).
/// Unrecognised values fall back to `Unknown` instead of failing the whole
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    ChangesRequested,
    Commented,
    Approved,
    Dismissed,
    Pending,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::ChangesRequested => "CHANGES_REQUESTED",
            ReviewState::Commented => "COMMENTED",
            ReviewState::Approved => "APPROVED",
            ReviewState::Dismissed => "DISMISSED",
            ReviewState::Pending => "PENDING",
            ReviewState::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Actor {
    pub login: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Review {
    pub author: Option<Actor>,
    pub state: ReviewState,
    pub body: String,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Review {
    pub fn author_login(&self) -> &str {
        self.author.as_ref().map(|a| a.login.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReactionUsers {
    pub total_count: u64,
}

/// One emoji reaction bucket on a comment, e.g. `EYES` with two users.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReactionGroup {
    pub content: String,
    pub users: ReactionUsers,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Comment {
    pub body: String,
    pub reaction_groups: Vec<ReactionGroup>,
}

/// Inline review thread. Extra wire fields (comment counts etc.) are
/// ignored; resolution state is all the classifier needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewThread {
    pub is_resolved: bool,
    pub is_outdated: bool,
}

/// The `comments` field changed shape across API generations: newer
/// payloads carry full comment nodes, legacy ones just a count. Normalising
/// here keeps the classifier working on a plain slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentPayload {
    Nodes(Vec<Comment>),
    LegacyCount(i64),
}

impl CommentPayload {
    pub fn nodes(&self) -> &[Comment] {
        match self {
            CommentPayload::Nodes(nodes) => nodes,
            CommentPayload::LegacyCount(_) => &[],
        }
    }
}

/// A pull request as returned by `gh pr list --json` / the GraphQL API.
/// Every field defaults so sparse payloads deserialize to "no signal"
/// rather than erroring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PullRequest {
    pub number: Option<u64>,
    pub title: String,
    pub url: String,
    pub body: String,
    pub author: Option<Actor>,
    pub is_draft: bool,
    pub repository: Option<Repository>,
    /// Chronological, oldest first.
    pub reviews: Vec<Review>,
    pub latest_reviews: Vec<Review>,
    /// Only presence/absence matters to classification.
    pub review_requests: Vec<serde_json::Value>,
    pub comment_nodes: Option<CommentPayload>,
    pub comments: Option<CommentPayload>,
    pub review_threads: Vec<ReviewThread>,
    /// Pre-collected free-text status lines, an alternative signal to
    /// page scraping.
    #[serde(rename = "llm_statuses")]
    pub llm_statuses: Option<Vec<String>>,
}

impl PullRequest {
    /// Normalised comment list: prefers `commentNodes`, falls back to the
    /// legacy `comments` field, and treats count-only payloads as empty.
    pub fn comment_nodes(&self) -> &[Comment] {
        match (&self.comment_nodes, &self.comments) {
            (Some(payload), _) => payload.nodes(),
            (None, Some(payload)) => payload.nodes(),
            (None, None) => &[],
        }
    }

    /// Stable key for cache entries: the PR URL when present, otherwise
    /// `owner/name#number` with `unknown` placeholders for missing parts.
    pub fn cache_key(&self) -> String {
        if !self.url.is_empty() {
            return self.url.clone();
        }

        let (owner, name) = match &self.repository {
            Some(repo) => (
                non_empty_or_unknown(&repo.owner),
                non_empty_or_unknown(&repo.name),
            ),
            None => ("unknown", "unknown"),
        };
        let number = self
            .number
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!("{owner}/{name}#{number}")
    }

    pub fn author_login(&self) -> &str {
        self.author.as_ref().map(|a| a.login.as_str()).unwrap_or("unknown")
    }
}

fn non_empty_or_unknown(value: &str) -> &str {
    if value.is_empty() { "unknown" } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_integer_comments_deserialize_as_empty_nodes() {
        let pr: PullRequest = serde_json::from_value(json!({
            "isDraft": false,
            "comments": 5,
        }))
        .unwrap();
        assert!(pr.comment_nodes().is_empty());
    }

    #[test]
    fn comment_nodes_preferred_over_legacy_comments() {
        let pr: PullRequest = serde_json::from_value(json!({
            "commentNodes": [{"body": "hi", "reactionGroups": []}],
            "comments": 3,
        }))
        .unwrap();
        assert_eq!(pr.comment_nodes().len(), 1);
    }

    #[test]
    fn unknown_review_state_falls_back() {
        let review: Review = serde_json::from_value(json!({
            "author": {"login": "someone"},
            "state": "SOMETHING_NEW",
        }))
        .unwrap();
        assert_eq!(review.state, ReviewState::Unknown);
    }

    #[test]
    fn cache_key_prefers_url() {
        let pr: PullRequest = serde_json::from_value(json!({
            "url": "https://github.com/owner/repo/pull/7",
            "repository": {"owner": "owner", "name": "repo"},
        }))
        .unwrap();
        assert_eq!(pr.cache_key(), "https://github.com/owner/repo/pull/7");
    }

    #[test]
    fn cache_key_falls_back_to_repo_and_number() {
        let pr: PullRequest = serde_json::from_value(json!({
            "number": 42,
            "repository": {"owner": "octocat", "name": "hello-world"},
        }))
        .unwrap();
        assert_eq!(pr.cache_key(), "octocat/hello-world#42");
    }

    #[test]
    fn cache_key_degrades_to_unknown_placeholders() {
        let pr = PullRequest::default();
        assert_eq!(pr.cache_key(), "unknown/unknown#unknown");
    }
}
