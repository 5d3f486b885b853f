//! Polling orchestration: classify, snapshot, re-classify.

use std::path::PathBuf;

use tracing::info;

use crate::phase::{FinishedReactionCache, determine_phase};
use crate::recorder::{PageFetcher, SnapshotRecorder};
use crate::types::{Phase, PullRequest};

/// Owns the long-lived classification state for the monitoring process and
/// drives the two-pass classification per PR.
pub struct Monitor {
    finished: FinishedReactionCache,
    recorder: SnapshotRecorder,
    fetcher: Box<dyn PageFetcher>,
}

impl Monitor {
    pub fn new(snapshot_dir: impl Into<PathBuf>, fetcher: Box<dyn PageFetcher>) -> Self {
        Self {
            finished: FinishedReactionCache::new(),
            recorder: SnapshotRecorder::new(snapshot_dir),
            fetcher,
        }
    }

    /// Classifies one PR. When the first pass lands on `LLM working`
    /// because of active reactions, a snapshot is recorded (possibly
    /// confirming the reactions as finished) and classification runs again
    /// with the updated cache.
    pub fn classify(&mut self, pr: &PullRequest) -> Phase {
        let first_pass = determine_phase(pr, &self.finished);
        if first_pass != Phase::LlmWorking {
            return first_pass;
        }

        self.recorder.record_reaction_snapshot(
            pr,
            first_pass,
            &mut self.finished,
            self.fetcher.as_ref(),
        );
        determine_phase(pr, &self.finished)
    }

    /// Runs one polling pass over the given PRs, returning each PR's cache
    /// key with its final phase.
    pub fn poll_once(&mut self, prs: &[PullRequest]) -> Vec<(String, Phase)> {
        self.recorder.begin_iteration();
        prs.iter()
            .map(|pr| {
                let phase = self.classify(pr);
                info!(url = %pr.url, phase = %phase, "classified pull request");
                (pr.cache_key(), phase)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::NullPageFetcher;
    use serde_json::json;
    use tempfile::TempDir;

    fn reaction_pinned_pr() -> PullRequest {
        serde_json::from_value(json!({
            "url": "https://github.com/octocat/hello-world/pull/9",
            "repository": {"owner": "octocat", "name": "hello-world"},
            "isDraft": false,
            "reviews": [
                {"author": {"login": "copilot-pull-request-reviewer"}, "state": "COMMENTED"},
            ],
            "latestReviews": [
                {"author": {"login": "copilot-pull-request-reviewer"}, "state": "COMMENTED"},
            ],
            "commentNodes": [{
                "body": "on it",
                "reactionGroups": [{"content": "EYES", "users": {"totalCount": 1}}],
            }],
            "reviewThreads": [],
        }))
        .expect("valid PR fixture")
    }

    struct FinishedPage;

    impl PageFetcher for FinishedPage {
        fn fetch_rendered_page(&self, _url: &str) -> Option<String> {
            Some("eyes acknowledged\nLLM status: started work\nLLM status: finished work".into())
        }
    }

    #[test]
    fn reaction_pinned_pr_stays_llm_working_without_page_signal() {
        let tmp = TempDir::new().unwrap();
        let mut monitor = Monitor::new(tmp.path(), Box::new(NullPageFetcher));

        let phases = monitor.poll_once(&[reaction_pinned_pr()]);
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].1, Phase::LlmWorking);
    }

    #[test]
    fn second_pass_picks_up_the_finished_confirmation() {
        let tmp = TempDir::new().unwrap();
        let mut monitor = Monitor::new(tmp.path(), Box::new(FinishedPage));

        let phases = monitor.poll_once(&[reaction_pinned_pr()]);
        assert_eq!(phases[0].1, Phase::Phase3);

        // Later iterations stay unstuck without refetching anything new.
        let phases = monitor.poll_once(&[reaction_pinned_pr()]);
        assert_eq!(phases[0].1, Phase::Phase3);
    }
}
