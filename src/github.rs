//! Thin wrappers around the `gh` CLI.
//!
//! The monitor shells out to `gh` rather than speaking GraphQL directly so
//! authentication and pagination stay the CLI's problem.

use std::process::Command;

use anyhow::{Context, Result};

use crate::types::{PullRequest, Repository};

const PR_LIST_FIELDS: &str =
    "number,title,url,body,author,isDraft,reviews,latestReviews,reviewRequests,comments,reviewThreads";

/// Fetches the open pull requests of a repository as typed records.
pub fn fetch_open_pull_requests(repo: &str, limit: usize) -> Result<Vec<PullRequest>> {
    let (owner, name) = parse_repo_from_string(repo)?;

    let output = Command::new("gh")
        .args([
            "pr",
            "list",
            "--repo",
            repo,
            "--state",
            "open",
            "--json",
            PR_LIST_FIELDS,
            "--limit",
            &limit.to_string(),
        ])
        .output()
        .context("failed to run 'gh pr list'; is the gh CLI installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("gh pr list failed for '{}': {}", repo, stderr.trim());
    }

    let mut prs: Vec<PullRequest> =
        serde_json::from_slice(&output.stdout).context("failed to parse gh pr list output")?;

    // gh pr list omits the repository object; fill it from the query target
    // so cache keys and snapshot directories stay stable.
    for pr in &mut prs {
        if pr.repository.is_none() {
            pr.repository = Some(Repository {
                owner: owner.to_string(),
                name: name.to_string(),
            });
        }
    }

    Ok(prs)
}

pub fn parse_repo_from_string(repo: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = repo.split('/').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        anyhow::bail!("Repository must be in format 'owner/repo', got: '{}'", repo);
    }
    Ok((parts[0], parts[1]))
}

/// Parses a GitHub PR URL into (owner, repo, number).
pub fn parse_pr_url(url_str: &str) -> Result<(String, String, u64)> {
    let url =
        url::Url::parse(url_str).with_context(|| format!("Failed to parse URL: '{}'", url_str))?;

    if url.host_str() != Some("github.com") {
        anyhow::bail!("URL must be a GitHub PR URL, got: '{}'", url_str);
    }

    let path_segments: Vec<&str> = url
        .path_segments()
        .context("Cannot parse URL path")?
        .collect();

    // Expected path structure: ["owner", "repo", "pull", "123"]
    if path_segments.len() != 4 || path_segments[2] != "pull" {
        anyhow::bail!(
            "URL must be in format https://github.com/owner/repo/pull/123, got: '{}'",
            url_str
        );
    }

    let owner = path_segments[0].to_string();
    let repo = path_segments[1].to_string();
    let pr_number: u64 = path_segments[3]
        .parse()
        .with_context(|| format!("Invalid PR number in URL: '{}'", url_str))?;

    Ok((owner, repo, pr_number))
}
