//! Snapshot capture and finished-reaction confirmation.
//!
//! When the reaction short-circuit pins a PR at `LLM working`, the recorder
//! persists a point-in-time snapshot for debugging and, when a rendered
//! page is available, analyses it for a completion acknowledgement that
//! unsticks the PR. Content-based deduplication keeps repeated polls from
//! rewriting identical snapshots or refetching pages needlessly.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use crate::github::parse_pr_url;
use crate::phase::FinishedReactionCache;
use crate::signature::has_active_reactions;
use crate::status::extract_llm_status_tokens;
use crate::types::{Comment, Phase, PullRequest};

/// Collaborator that retrieves a simplified text rendering of a PR page.
///
/// Implementations are best-effort: any failure (timeout, HTTP error,
/// decode error) is `None`, never a panic or an `Err`.
pub trait PageFetcher {
    fn fetch_rendered_page(&self, url: &str) -> Option<String>;
}

/// Fetcher that never returns a page; disables page-based confirmation.
#[derive(Debug, Default)]
pub struct NullPageFetcher;

impl PageFetcher for NullPageFetcher {
    fn fetch_rendered_page(&self, _url: &str) -> Option<String> {
        None
    }
}

/// Paths produced by one snapshot write.
#[derive(Debug, Clone)]
pub struct SnapshotPaths {
    pub snapshot_dir: PathBuf,
    pub raw_path: PathBuf,
    pub summary_path: PathBuf,
    pub page_path: Option<PathBuf>,
    pub statuses_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct SnapshotContent {
    raw_json: String,
    page_text: Option<String>,
}

/// Records PR snapshots and tracks what was already seen.
///
/// Owns two of the three process-wide maps: the content cache (change
/// detection across iterations) and the per-iteration dedup set. The
/// finished-reaction cache is passed in by the caller so the classifier
/// can share it.
pub struct SnapshotRecorder {
    base_dir: PathBuf,
    content_cache: HashMap<String, SnapshotContent>,
    recorded_this_iteration: HashSet<String>,
}

impl SnapshotRecorder {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            content_cache: HashMap::new(),
            recorded_this_iteration: HashSet::new(),
        }
    }

    /// Clears the per-iteration dedup set. Call at the start of every
    /// polling pass.
    pub fn begin_iteration(&mut self) {
        self.recorded_this_iteration.clear();
    }

    /// Drops remembered content so the next record always writes.
    pub fn clear_content_cache(&mut self) {
        self.content_cache.clear();
    }

    /// Records a snapshot for a PR pinned at `LLM working` by comment
    /// reactions, stamping it with the current time.
    pub fn record_reaction_snapshot(
        &mut self,
        pr: &PullRequest,
        phase: Phase,
        finished: &mut FinishedReactionCache,
        fetcher: &dyn PageFetcher,
    ) -> Option<SnapshotPaths> {
        self.record_reaction_snapshot_at(pr, phase, finished, fetcher, Utc::now())
    }

    /// Timestamp-injecting variant of [`record_reaction_snapshot`] for
    /// deterministic tests.
    ///
    /// Returns `None` when nothing was written: wrong phase, no active
    /// reactions, already recorded this iteration, unchanged content, or a
    /// swallowed I/O failure. Failures are logged and never propagate; the
    /// polling loop must survive a full disk or a dead network.
    ///
    /// [`record_reaction_snapshot`]: Self::record_reaction_snapshot
    pub fn record_reaction_snapshot_at(
        &mut self,
        pr: &PullRequest,
        phase: Phase,
        finished: &mut FinishedReactionCache,
        fetcher: &dyn PageFetcher,
        now: DateTime<Utc>,
    ) -> Option<SnapshotPaths> {
        if phase != Phase::LlmWorking {
            return None;
        }
        if !has_active_reactions(pr.comment_nodes()) {
            return None;
        }

        let pr_key = pr.cache_key();
        if self.recorded_this_iteration.contains(&pr_key) {
            return None;
        }

        let raw_json = match serde_json::to_string_pretty(pr) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, url = %pr.url, "failed to serialize PR for snapshot");
                return None;
            }
        };

        let previous = self.content_cache.get(&pr_key);

        // Skip the slow page fetch when the JSON already tells us the PR
        // changed; a snapshot will be written either way.
        let json_changed = previous.is_some_and(|prev| prev.raw_json != raw_json);
        let page_text = if json_changed {
            debug!(url = %pr.url, "PR content changed, skipping page fetch");
            None
        } else {
            fetcher.fetch_rendered_page(&pr.url)
        };

        if let Some(prev) = previous
            && prev.raw_json == raw_json
            && prev.page_text == page_text
        {
            self.recorded_this_iteration.insert(pr_key);
            return None;
        }

        if let Some(text) = page_text.as_deref()
            && let Some(finished_now) = page_confirms_finished(text)
        {
            finished.update(pr, finished_now);
        }

        let paths = match self.write_snapshot(pr, phase, &raw_json, page_text.as_deref(), now) {
            Ok(paths) => paths,
            Err(err) => {
                warn!(error = %err, url = %pr.url, "failed to write PR snapshot");
                return None;
            }
        };

        self.content_cache
            .insert(pr_key.clone(), SnapshotContent { raw_json, page_text });
        self.recorded_this_iteration.insert(pr_key);
        Some(paths)
    }

    fn write_snapshot(
        &self,
        pr: &PullRequest,
        phase: Phase,
        raw_json: &str,
        page_text: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<SnapshotPaths> {
        let (owner, name) = repo_components(pr);
        let pr_number = extract_pr_number(&pr.url);
        // One stable directory per PR; each write inside it gets a
        // timestamped filename.
        let dir_name = format!("{owner}_{name}_PR{pr_number}");
        let timestamp = now.format("%Y%m%d_%H%M%S").to_string();
        let prefix = format!("{dir_name}_{timestamp}");

        let snapshot_dir = self.base_dir.join(&dir_name);
        fs::create_dir_all(&snapshot_dir)
            .with_context(|| format!("creating snapshot directory {}", snapshot_dir.display()))?;

        let raw_path = snapshot_dir.join(format!("{prefix}_raw.json"));
        fs::write(&raw_path, raw_json)
            .with_context(|| format!("writing raw snapshot {}", raw_path.display()))?;

        let summary = build_summary(pr, phase, "comment_reactions_detected", &timestamp, &prefix);
        let summary_path = snapshot_dir.join(format!("{prefix}_summary.md"));
        fs::write(&summary_path, summary)
            .with_context(|| format!("writing snapshot summary {}", summary_path.display()))?;

        let mut page_path = None;
        let mut statuses_path = None;
        if let Some(text) = page_text {
            let path = snapshot_dir.join(format!("{prefix}_page.txt"));
            fs::write(&path, text)
                .with_context(|| format!("writing page text {}", path.display()))?;
            page_path = Some(path);

            let tokens = extract_llm_status_tokens(text, None);
            if !tokens.is_empty() {
                let payload = serde_json::json!({ "llm_statuses": tokens });
                let rendered = serde_json::to_string_pretty(&payload)
                    .context("serializing llm_statuses artifact")?;
                let path = snapshot_dir.join(format!("{prefix}_llm_statuses.json"));
                fs::write(&path, rendered)
                    .with_context(|| format!("writing llm_statuses {}", path.display()))?;
                statuses_path = Some(path);
            }
        }

        Ok(SnapshotPaths {
            snapshot_dir,
            raw_path,
            summary_path,
            page_path,
            statuses_path,
        })
    }
}

/// Scans rendered page text for an "eyes" acknowledgement and a later
/// completion marker.
///
/// Returns `Some(true)` when "finished work" follows the acknowledgement
/// (and any later restart), `Some(false)` when the acknowledgement is
/// present without completion, and `None` when the text carries no
/// acknowledgement at all, in which case any prior confirmation is left
/// untouched, same as a failed fetch.
fn page_confirms_finished(text: &str) -> Option<bool> {
    let lowered = text.to_lowercase();
    let eyes_at = lowered.find("eyes").or_else(|| lowered.find("\u{1F440}"))?;
    let tail = &lowered[eyes_at..];
    let last_finished = tail.rfind("finished work");
    let last_started = tail.rfind("started work");
    match (last_finished, last_started) {
        (Some(finished), Some(started)) => Some(finished > started),
        (Some(_), None) => Some(true),
        (None, _) => Some(false),
    }
}

fn sanitize_component(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "unknown".to_string();
    }
    trimmed
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

fn repo_components(pr: &PullRequest) -> (String, String) {
    if let Some(repo) = &pr.repository {
        return (sanitize_component(&repo.owner), sanitize_component(&repo.name));
    }
    // Payloads from `gh pr list` lack the repository object; the URL still
    // identifies it.
    if let Ok((owner, name, _)) = parse_pr_url(&pr.url) {
        return (sanitize_component(&owner), sanitize_component(&name));
    }
    ("unknown".to_string(), "unknown".to_string())
}

fn extract_pr_number(url: &str) -> String {
    static PR_NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = PR_NUMBER.get_or_init(|| Regex::new(r"/pull/(\d+)").expect("valid pattern"));
    re.captures(url)
        .and_then(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn summarize_reactions(comments: &[Comment]) -> Vec<String> {
    let mut summaries = Vec::new();
    for (index, comment) in comments.iter().enumerate() {
        for group in &comment.reaction_groups {
            if group.users.total_count > 0 {
                summaries.push(format!(
                    "Comment {}: {} x{}",
                    index + 1,
                    group.content,
                    group.users.total_count
                ));
            }
        }
    }
    summaries
}

fn build_summary(
    pr: &PullRequest,
    phase: Phase,
    reason: &str,
    timestamp: &str,
    prefix: &str,
) -> String {
    let (owner, name) = match &pr.repository {
        Some(repo) => (repo.owner.as_str(), repo.name.as_str()),
        None => ("unknown", "unknown"),
    };
    let pr_number = extract_pr_number(&pr.url);
    let url = if pr.url.is_empty() { "unknown" } else { pr.url.as_str() };
    let latest_state = pr
        .reviews
        .last()
        .map(|review| review.state.as_str())
        .unwrap_or("unknown");
    let unresolved = pr
        .review_threads
        .iter()
        .filter(|thread| !thread.is_resolved && !thread.is_outdated)
        .count();

    let mut lines = vec![
        format!("# PR snapshot {owner}/{name} #{pr_number}"),
        String::new(),
        format!("- Timestamp: {timestamp}"),
        format!("- Snapshot prefix: {prefix}"),
        format!("- URL: {url}"),
        format!("- Title: {}", pr.title),
        format!("- Author: {}", pr.author_login()),
        format!("- Phase decision: {phase}"),
        format!("- Reason: {reason}"),
        String::new(),
        "## Reviews".to_string(),
        format!("- Review count: {}", pr.reviews.len()),
        format!("- Latest review state: {latest_state}"),
        String::new(),
        "## Review threads".to_string(),
        format!("- {unresolved} unresolved"),
        String::new(),
        "## Comment reactions".to_string(),
    ];

    let reactions = summarize_reactions(pr.comment_nodes());
    if reactions.is_empty() {
        lines.push("- None".to_string());
    } else {
        lines.extend(reactions.into_iter().map(|item| format!("- {item}")));
    }

    lines.push(String::new());
    lines.push("## Body".to_string());
    lines.push(String::new());
    lines.push(pr.body.clone());

    lines.join("\n")
}
