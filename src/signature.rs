//! Deterministic fingerprints of comment reactions.
//!
//! The signature answers "has the set of reactions changed?" without caring
//! about comment order, so a finished confirmation survives new comments
//! being interleaved on later polls.

use serde::Serialize;

use crate::types::Comment;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
struct ReactionEntry {
    content: String,
    count: u64,
}

#[derive(Serialize)]
struct CommentReactions<'a> {
    reactions: &'a [ReactionEntry],
}

/// Builds an order-insensitive signature of all non-zero comment reactions.
///
/// Reaction groups with zero users are dropped, comments left with no
/// groups contribute nothing, and both the groups within a comment and the
/// comments themselves are put into a canonical order before serialization.
/// Two comment lists that are permutations of each other with identical
/// counts therefore produce byte-identical output. No reactions at all
/// yields the empty string, meaning "no signature" rather than an error.
pub fn reaction_signature(comments: &[Comment]) -> String {
    let mut per_comment: Vec<Vec<ReactionEntry>> = Vec::new();
    for comment in comments {
        let mut entries: Vec<ReactionEntry> = comment
            .reaction_groups
            .iter()
            .filter(|group| group.users.total_count > 0)
            .map(|group| ReactionEntry {
                content: group.content.clone(),
                count: group.users.total_count,
            })
            .collect();
        if entries.is_empty() {
            continue;
        }
        entries.sort();
        per_comment.push(entries);
    }

    if per_comment.is_empty() {
        return String::new();
    }

    // Canonical order across comments so the result does not depend on
    // comment position in the payload.
    per_comment.sort();

    let wrapped: Vec<CommentReactions<'_>> = per_comment
        .iter()
        .map(|reactions| CommentReactions { reactions })
        .collect();
    serde_json::to_string(&wrapped).unwrap_or_default()
}

/// True when any comment carries a reaction group with at least one user.
/// This is the "an agent is actively processing comments" signal.
pub fn has_active_reactions(comments: &[Comment]) -> bool {
    comments.iter().any(|comment| {
        comment
            .reaction_groups
            .iter()
            .any(|group| group.users.total_count > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReactionGroup, ReactionUsers};

    fn comment(body: &str, reactions: &[(&str, u64)]) -> Comment {
        Comment {
            body: body.to_string(),
            reaction_groups: reactions
                .iter()
                .map(|(content, count)| ReactionGroup {
                    content: content.to_string(),
                    users: ReactionUsers { total_count: *count },
                })
                .collect(),
        }
    }

    #[test]
    fn empty_input_yields_empty_signature() {
        assert_eq!(reaction_signature(&[]), "");
    }

    #[test]
    fn zero_count_groups_are_filtered_out() {
        let comments = vec![comment("hi", &[("EYES", 0)])];
        assert_eq!(reaction_signature(&comments), "");
        assert!(!has_active_reactions(&comments));
    }

    #[test]
    fn signature_is_order_insensitive_across_comments() {
        let a = vec![
            comment("first", &[("EYES", 1)]),
            comment("second", &[("ROCKET", 2), ("HEART", 1)]),
        ];
        let b = vec![
            comment("second", &[("HEART", 1), ("ROCKET", 2)]),
            comment("first", &[("EYES", 1)]),
        ];
        let sig_a = reaction_signature(&a);
        let sig_b = reaction_signature(&b);
        assert!(!sig_a.is_empty());
        assert_eq!(sig_a, sig_b);
    }

    #[test]
    fn unrelated_reaction_free_comments_do_not_change_signature() {
        let baseline = vec![comment("watched", &[("EYES", 1)])];
        let with_noise = vec![
            comment("new note", &[]),
            comment("watched", &[("EYES", 1)]),
            comment("another", &[("THUMBS_UP", 0)]),
        ];
        assert_eq!(reaction_signature(&baseline), reaction_signature(&with_noise));
    }

    #[test]
    fn count_changes_change_the_signature() {
        let one = vec![comment("c", &[("EYES", 1)])];
        let two = vec![comment("c", &[("EYES", 2)])];
        assert_ne!(reaction_signature(&one), reaction_signature(&two));
    }

    #[test]
    fn active_reactions_detected() {
        let comments = vec![
            comment("quiet", &[]),
            comment("watched", &[("EYES", 1)]),
        ];
        assert!(has_active_reactions(&comments));
    }
}
