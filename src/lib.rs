//! prphase: phase detection for agent-driven GitHub pull requests.
//!
//! Polls a repository's open pull requests, classifies each into a workflow
//! phase (draft, needs fixes, ready for review, or agent still working)
//! from review history, inline thread state, and comment reactions, and
//! records content-deduplicated snapshots whenever a PR is pinned at
//! "LLM working" by reaction activity. Rendered-page analysis can confirm
//! lingering reactions as finished so such PRs become classifiable again.

pub mod fetch;
pub mod github;
pub mod monitor;
pub mod phase;
pub mod recorder;
pub mod signature;
pub mod status;
pub mod types;

pub use fetch::HttpPageFetcher;
pub use github::{fetch_open_pull_requests, parse_pr_url, parse_repo_from_string};
pub use monitor::Monitor;
pub use phase::{
    FinishedReactionCache, REVIEWER_LOGIN, SWE_AGENT_LOGIN, determine_phase,
    has_unresolved_review_threads,
};
pub use recorder::{NullPageFetcher, PageFetcher, SnapshotPaths, SnapshotRecorder};
pub use signature::{has_active_reactions, reaction_signature};
pub use status::{StatusSignal, extract_llm_status_tokens, review_cycle_signal};
pub use types::{
    Comment, CommentPayload, Phase, PullRequest, ReactionGroup, ReactionUsers, Review,
    ReviewState, ReviewThread,
};
