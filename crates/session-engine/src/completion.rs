//! Early-stop completion-phrase matching (§6). A step's `evaluation` or
//! `next_goal` text is checked against a fixed phrase set; any
//! case-insensitive match ends the loop normally rather than as a
//! failure, once at least 3 steps have run.

const EVALUATION_PHRASES: &[&str] = &[
    "task completed",
    "goal achieved",
    "successfully finished",
    "completed successfully",
    "task is complete",
    "finished successfully",
];

const NEXT_GOAL_PHRASES: &[&str] = &["none", "no further", "task complete", "done"];

pub const MIN_STEP_FOR_EARLY_STOP: u32 = 3;

pub fn is_complete(evaluation: Option<&str>, next_goal: &str) -> bool {
    let eval_match = evaluation
        .map(|e| contains_any(e, EVALUATION_PHRASES))
        .unwrap_or(false);
    let goal_match = contains_any(next_goal, NEXT_GOAL_PHRASES);
    eval_match || goal_match
}

fn contains_any(haystack: &str, phrases: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    phrases.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_evaluation_phrase_case_insensitively() {
        assert!(is_complete(Some("Task Completed, link opened"), "keep going"));
    }

    #[test]
    fn matches_next_goal_phrase() {
        assert!(is_complete(None, "None"));
        assert!(is_complete(Some("still working"), "no further action needed"));
    }

    #[test]
    fn no_match_when_neither_field_contains_a_phrase() {
        assert!(!is_complete(Some("page loaded"), "click the link"));
    }
}
