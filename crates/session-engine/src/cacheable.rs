//! Cacheable-action extraction policy (§4.7 Completion): turns the
//! low-level actions a step actually performed into the closed
//! tagged-union shape the Action Cache stores, for replay on a future
//! identical `(goal, url)` pair.
use action_cache::CachedAction;

/// What a step recorded as having happened, with coordinates already
/// resolved by the dispatcher rather than mined back out of a free-form
/// result payload.
#[derive(Debug, Clone)]
pub enum RecordedAction {
    ClickByMark { x: f64, y: f64 },
    TypeText { text: String },
    PressKey { key: String },
    Navigate { url: String },
    Other,
}

pub fn extract(actions: &[RecordedAction]) -> Vec<CachedAction> {
    actions.iter().filter_map(to_cached_action).collect()
}

fn to_cached_action(action: &RecordedAction) -> Option<CachedAction> {
    match action {
        RecordedAction::ClickByMark { x, y } => Some(CachedAction::Click {
            x: *x,
            y: *y,
            wait_ms: Some(1000),
        }),
        RecordedAction::TypeText { text } => Some(CachedAction::TypeText {
            text: text.clone(),
            wait_ms: Some(500),
        }),
        RecordedAction::PressKey { key } => Some(CachedAction::KeyPress {
            key: key.clone(),
            wait_ms: Some(300),
        }),
        // Navigation is excluded: the cache key already constrains the URL.
        RecordedAction::Navigate { .. } | RecordedAction::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_by_mark_becomes_click_with_1s_wait() {
        let extracted = extract(&[RecordedAction::ClickByMark { x: 12.0, y: 34.0 }]);
        assert_eq!(
            extracted,
            vec![CachedAction::Click { x: 12.0, y: 34.0, wait_ms: Some(1000) }]
        );
    }

    #[test]
    fn navigation_is_excluded() {
        let extracted = extract(&[RecordedAction::Navigate { url: "https://example.com".into() }]);
        assert!(extracted.is_empty());
    }

    #[test]
    fn mixed_actions_preserve_order_and_drop_navigation() {
        let extracted = extract(&[
            RecordedAction::Navigate { url: "https://example.com".into() },
            RecordedAction::ClickByMark { x: 1.0, y: 2.0 },
            RecordedAction::TypeText { text: "100".into() },
            RecordedAction::PressKey { key: "Enter".into() },
        ]);
        assert_eq!(extracted.len(), 3);
        assert_eq!(extracted[1], CachedAction::TypeText { text: "100".into(), wait_ms: Some(500) });
        assert_eq!(extracted[2], CachedAction::KeyPress { key: "Enter".into(), wait_ms: Some(300) });
    }
}
