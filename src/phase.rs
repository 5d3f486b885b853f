//! PR phase classification.
//!
//! `determine_phase` maps a pull request's review history, thread state,
//! comment reactions, and optional status lines to one of four phases. The
//! only state it consults is the [`FinishedReactionCache`], which the
//! snapshot recorder populates when page analysis confirms that lingering
//! reactions belong to completed work.

use std::collections::HashMap;

use crate::signature::{has_active_reactions, reaction_signature};
use crate::status::{StatusSignal, review_cycle_signal};
use crate::types::{Phase, PullRequest, Review, ReviewState, ReviewThread};

/// The automated review bot whose verdicts drive phase2/phase3.
pub const REVIEWER_LOGIN: &str = "copilot-pull-request-reviewer";
/// The automated fix agent responding to review feedback.
pub const SWE_AGENT_LOGIN: &str = "copilot-swe-agent";

/// Long-lived record of reaction signatures confirmed as finished via
/// rendered-page analysis.
///
/// Entries are written only on explicit confirmation and removed when a
/// later analysis says not-finished. The cache lives for the monitoring
/// process; it has no disk persistence. Keeping it on an owned object
/// (rather than a module global) lets tests construct isolated instances.
#[derive(Debug, Default)]
pub struct FinishedReactionCache {
    entries: HashMap<String, String>,
}

impl FinishedReactionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records or clears the finished confirmation for this PR's current
    /// reaction signature. A PR with no signature cannot be confirmed, so
    /// any stale entry is dropped.
    pub fn update(&mut self, pr: &PullRequest, finished: bool) {
        let key = pr.cache_key();
        let signature = reaction_signature(pr.comment_nodes());
        if finished && !signature.is_empty() {
            self.entries.insert(key, signature);
        } else {
            self.entries.remove(&key);
        }
    }

    /// True when the PR's current reactions exactly match a signature
    /// previously confirmed as finished.
    pub fn is_finished(&self, pr: &PullRequest) -> bool {
        let signature = reaction_signature(pr.comment_nodes());
        if signature.is_empty() {
            return false;
        }
        self.entries.get(&pr.cache_key()) == Some(&signature)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// True iff at least one inline review thread is neither resolved nor
/// outdated, i.e. feedback still requires action.
pub fn has_unresolved_review_threads(threads: &[ReviewThread]) -> bool {
    threads
        .iter()
        .any(|thread| !thread.is_resolved && !thread.is_outdated)
}

fn reviews_chronological(reviews: &[Review]) -> bool {
    reviews.windows(2).all(|pair| {
        match (pair[0].submitted_at, pair[1].submitted_at) {
            (Some(earlier), Some(later)) => earlier <= later,
            // Timestamps are optional; order is trusted when absent.
            _ => true,
        }
    })
}

fn status_signal(pr: &PullRequest) -> StatusSignal {
    match &pr.llm_statuses {
        Some(statuses) => review_cycle_signal(statuses),
        None => StatusSignal::NoSignal,
    }
}

/// Determines which phase the PR is in.
///
/// Precondition: `pr.reviews` is chronological, oldest first (asserted in
/// debug builds via `submittedAt` where present). The decision order is
/// significant; the first matching rule wins. Never panics or errors on
/// sparse input: missing data degrades to `LlmWorking`, the "needs more
/// observation" state.
pub fn determine_phase(pr: &PullRequest, finished: &FinishedReactionCache) -> Phase {
    debug_assert!(
        reviews_chronological(&pr.reviews),
        "reviews must be ordered oldest first"
    );

    // Reactions are the freshest signal of in-flight agent work. Only a
    // signature already confirmed finished lets classification proceed,
    // which is what unsticks a PR from perpetual LlmWorking.
    if has_active_reactions(pr.comment_nodes()) && !finished.is_finished(pr) {
        return Phase::LlmWorking;
    }

    if pr.is_draft {
        // A draft with no review request means the agent has not asked for
        // review yet.
        return if pr.review_requests.is_empty() {
            Phase::LlmWorking
        } else {
            Phase::Phase1
        };
    }

    if pr.reviews.is_empty() || pr.latest_reviews.is_empty() {
        return match status_signal(pr) {
            StatusSignal::Finished => Phase::Phase3,
            _ => Phase::LlmWorking,
        };
    }

    let Some(latest) = pr.reviews.last() else {
        return Phase::LlmWorking;
    };

    match latest.author_login() {
        REVIEWER_LOGIN => match latest.state {
            ReviewState::ChangesRequested => Phase::Phase2,
            ReviewState::Commented => {
                if has_unresolved_review_threads(&pr.review_threads) {
                    Phase::Phase2
                } else {
                    Phase::Phase3
                }
            }
            // APPROVED, DISMISSED, PENDING and anything newer.
            _ => Phase::Phase3,
        },
        SWE_AGENT_LOGIN => classify_after_agent(pr),
        _ => match status_signal(pr) {
            StatusSignal::Finished => Phase::Phase3,
            _ => Phase::LlmWorking,
        },
    }
}

/// Classification when the latest review came from the fix agent: the
/// reviewer's last verdict and the shape of the agent's responses decide
/// whether the feedback was actually addressed.
fn classify_after_agent(pr: &PullRequest) -> Phase {
    let mut latest_reviewer_index = None;
    let mut latest_reviewer_state = None;
    let mut first_agent_index = None;
    let mut agent_review_count = 0usize;

    for (index, review) in pr.reviews.iter().enumerate() {
        match review.author_login() {
            SWE_AGENT_LOGIN => {
                agent_review_count += 1;
                if first_agent_index.is_none() {
                    first_agent_index = Some(index);
                }
            }
            REVIEWER_LOGIN => {
                latest_reviewer_index = Some(index);
                latest_reviewer_state = Some(review.state);
            }
            _ => {}
        }
    }

    // An explicit change request blocks until the reviewer itself
    // supersedes it; the agent's own activity never clears it.
    if latest_reviewer_state == Some(ReviewState::ChangesRequested) {
        return Phase::Phase2;
    }

    if has_unresolved_review_threads(&pr.review_threads) {
        let re_reviewed = matches!(
            (latest_reviewer_index, first_agent_index),
            (Some(reviewer), Some(agent)) if reviewer > agent
        );
        let completed = if latest_reviewer_state == Some(ReviewState::Commented) {
            // COMMENTED marks optional suggestions; one agent response
            // settles them.
            agent_review_count >= 1
        } else {
            agent_review_count > 1 || re_reviewed
        };
        return if completed { Phase::Phase3 } else { Phase::Phase2 };
    }

    Phase::Phase3
}
