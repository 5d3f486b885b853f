//! Best-effort extraction of LLM status lines.
//!
//! Two independent signals live here: a token scanner for rendered PR pages
//! ("LLM status: ..." marker lines plus trailing bullets) and a heuristic
//! over pre-collected free-text status lines deciding whether a review
//! cycle completed. Both are fuzzy by design; malformed input degrades to
//! "no signal", never to an error.

use std::collections::HashSet;

use regex::Regex;

const MARKER: &str = "llm status";
const NOISE_TOKENS: [&str; 2] = ["llm", "status"];
const TOKEN_PATTERN: &str = r"[A-Za-z][A-Za-z0-9_-]*";

/// Outcome of scanning a PR's collected LLM status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSignal {
    /// A review cycle completed: "finished work" follows the last
    /// "started work" after the last "started reviewing" anchor.
    Finished,
    /// A cycle is anchored but work has not finished since.
    Working,
    /// No "started reviewing" anchor; the statuses say nothing usable.
    NoSignal,
}

/// Applies the review-cycle pattern to free-text status lines.
///
/// The anchor is the last entry containing "started reviewing". From that
/// point on, the last "started work" must be followed by a "finished work"
/// to count as finished. Without the anchor, started/finished pairs alone
/// never confirm completion.
pub fn review_cycle_signal(statuses: &[String]) -> StatusSignal {
    let lowered: Vec<String> = statuses.iter().map(|s| s.to_lowercase()).collect();

    let Some(anchor) = lowered.iter().rposition(|s| s.contains("started reviewing")) else {
        return StatusSignal::NoSignal;
    };

    let tail = &lowered[anchor..];
    let Some(last_started) = tail.iter().rposition(|s| s.contains("started work")) else {
        // Review started, no work claimed since.
        return StatusSignal::Working;
    };

    let finished_after = tail[last_started + 1..]
        .iter()
        .any(|s| s.contains("finished work"));
    if finished_after {
        StatusSignal::Finished
    } else {
        StatusSignal::Working
    }
}

/// Extracts ordered, deduplicated status tokens from a markdown rendering
/// and optionally the raw page source.
///
/// Lines containing the "LLM status" marker contribute the tokens after a
/// colon on the same line, then tokens from following bullet lines until a
/// non-bullet line or heading ends the block. One shared seen-set covers
/// both passes, preserving first-seen order across them.
pub fn extract_llm_status_tokens(markdown: &str, raw: Option<&str>) -> Vec<String> {
    let Ok(token_re) = Regex::new(TOKEN_PATTERN) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    collect_status_tokens(markdown, &token_re, &mut seen, &mut tokens);
    if let Some(raw) = raw {
        collect_status_tokens(raw, &token_re, &mut seen, &mut tokens);
    }
    tokens
}

fn collect_status_tokens(
    text: &str,
    token_re: &Regex,
    seen: &mut HashSet<String>,
    out: &mut Vec<String>,
) {
    let lines: Vec<String> = text.lines().map(|line| line.to_lowercase()).collect();

    let mut index = 0;
    while index < lines.len() {
        let line = &lines[index];
        index += 1;

        let Some(marker_at) = line.find(MARKER) else {
            continue;
        };

        let after_marker = &line[marker_at + MARKER.len()..];
        if let Some(colon) = after_marker.find(':') {
            push_tokens(&after_marker[colon + 1..], token_re, seen, out);
        }

        // The block ends at the first non-bullet line or heading. This is
        // deliberately loose; adjacent bullet content can leak in.
        while index < lines.len() {
            let trimmed = lines[index].trim_start();
            if !matches!(trimmed.chars().next(), Some('-' | '*' | '+')) {
                break;
            }
            push_tokens(trimmed, token_re, seen, out);
            index += 1;
        }
    }
}

fn push_tokens(segment: &str, token_re: &Regex, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    for found in token_re.find_iter(segment) {
        let token = found.as_str().to_string();
        if NOISE_TOKENS.contains(&token.as_str()) {
            continue;
        }
        if seen.insert(token.clone()) {
            out.push(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn finished_after_reviewing_and_started() {
        let statuses = lines(&[
            "Copilot started reviewing on behalf of cat2151",
            "Codex started work on behalf of cat2151",
            "Codex finished work on behalf of cat2151",
        ]);
        assert_eq!(review_cycle_signal(&statuses), StatusSignal::Finished);
    }

    #[test]
    fn started_without_finish_is_working() {
        let statuses = lines(&[
            "Copilot started reviewing on behalf of cat2151",
            "Codex started work on behalf of cat2151",
        ]);
        assert_eq!(review_cycle_signal(&statuses), StatusSignal::Working);
    }

    #[test]
    fn no_reviewing_anchor_is_no_signal() {
        let statuses = lines(&[
            "Codex started work on behalf of cat2151",
            "Codex finished work on behalf of cat2151",
        ]);
        assert_eq!(review_cycle_signal(&statuses), StatusSignal::NoSignal);
    }

    #[test]
    fn anchor_uses_last_reviewing_entry() {
        // The finished entry before the second reviewing must not count.
        let statuses = lines(&[
            "Copilot started reviewing",
            "Codex started work",
            "Codex finished work",
            "Copilot started reviewing",
            "Codex started work",
        ]);
        assert_eq!(review_cycle_signal(&statuses), StatusSignal::Working);
    }

    #[test]
    fn interleaved_cycles_resolve_to_last_pair() {
        let statuses = lines(&[
            "Codex started work 23:31",
            "Codex finished work 23:33",
            "Copilot started reviewing 23:34",
            "Codex started work 23:35",
            "Codex finished work 23:37",
            "Codex started work 23:38",
            "Codex finished work 23:39",
        ]);
        assert_eq!(review_cycle_signal(&statuses), StatusSignal::Finished);
    }

    #[test]
    fn extracts_tokens_after_colon_and_bullets() {
        let markdown = "intro\nLLM status: started work\n- finished work\nnot a bullet\n- ignored now";
        let tokens = extract_llm_status_tokens(markdown, None);
        assert_eq!(tokens, vec!["started", "work", "finished"]);
    }

    #[test]
    fn heading_ends_the_bullet_block() {
        let markdown = "LLM status:\n- started\n# Next section\n- stray bullet";
        let tokens = extract_llm_status_tokens(markdown, None);
        assert_eq!(tokens, vec!["started"]);
    }

    #[test]
    fn marker_is_case_insensitive_and_noise_dropped() {
        let markdown = "llm STATUS: LLM status reviewing";
        let tokens = extract_llm_status_tokens(markdown, None);
        assert_eq!(tokens, vec!["reviewing"]);
    }

    #[test]
    fn seen_set_is_shared_across_passes() {
        let markdown = "LLM status: started work";
        let raw = "LLM status: started reviewing";
        let tokens = extract_llm_status_tokens(markdown, Some(raw));
        assert_eq!(tokens, vec!["started", "work", "reviewing"]);
    }

    #[test]
    fn text_without_marker_yields_nothing() {
        assert!(extract_llm_status_tokens("no markers here\n- bullet", None).is_empty());
    }
}
