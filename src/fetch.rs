//! Rendered-page retrieval over HTTP.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::recorder::PageFetcher;

/// Fetches a PR page and reduces it to plain text for the heuristic
/// scanners. Every failure path is `None`; the recorder treats a missing
/// page as "no signal this iteration".
pub struct HttpPageFetcher {
    client: reqwest::blocking::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    fn fetch_rendered_page(&self, url: &str) -> Option<String> {
        let response = match self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
        {
            Ok(response) => response,
            Err(err) => {
                debug!(error = %err, url, "page fetch failed");
                return None;
            }
        };

        match response.text() {
            Ok(body) => Some(strip_tags(&body)),
            Err(err) => {
                debug!(error = %err, url, "page body read failed");
                None
            }
        }
    }
}

/// Minimal HTML-to-text pass: tags become line breaks, text content is kept
/// verbatim. Downstream consumers are heuristic scanners, not parsers.
fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::strip_tags;

    #[test]
    fn tags_are_removed_and_text_kept() {
        let html = "<div><p>LLM status: finished work</p></div>";
        let text = strip_tags(html);
        assert!(text.contains("LLM status: finished work"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn tag_boundaries_become_line_breaks() {
        let html = "<p>first</p><p>second</p>";
        let text = strip_tags(html);
        let lines: Vec<&str> = text.lines().filter(|line| !line.is_empty()).collect();
        assert_eq!(lines, vec!["first", "second"]);
    }
}
