//! Cache-hit fast path: replays a previously recorded plan via the
//! low-level CDP Action Dispatcher, bypassing the LLM entirely.
use std::time::Duration;

use action_cache::CachedAction;
use browser_surface::CdpActionDispatcher;

use crate::error::SessionError;

pub async fn replay(dispatcher: &CdpActionDispatcher, actions: &[CachedAction]) -> Result<(), SessionError> {
    for action in actions {
        run_one(dispatcher, action).await?;
        tokio::time::sleep(Duration::from_millis(action.wait_ms())).await;
    }
    Ok(())
}

async fn run_one(dispatcher: &CdpActionDispatcher, action: &CachedAction) -> Result<(), SessionError> {
    match action {
        CachedAction::Click { x, y, .. } => dispatcher
            .click(*x, *y, browser_surface::MouseButton::Left, 1)
            .await
            .map_err(|e| SessionError::replay_failure(e.to_string())),
        CachedAction::TypeText { text, .. } => dispatcher
            .type_text(text)
            .await
            .map_err(|e| SessionError::replay_failure(e.to_string())),
        CachedAction::KeyPress { key, .. } => dispatcher
            .key_press(key)
            .await
            .map_err(|e| SessionError::replay_failure(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_cache::CachedAction;

    #[test]
    fn wait_ms_defaults_line_up_with_replay_pacing() {
        let click = CachedAction::Click { x: 1.0, y: 1.0, wait_ms: None };
        assert_eq!(click.wait_ms(), 500);
        let type_text = CachedAction::TypeText { text: "x".into(), wait_ms: None };
        assert_eq!(type_text.wait_ms(), 100);
        let key_press = CachedAction::KeyPress { key: "Enter".into(), wait_ms: None };
        assert_eq!(key_press.wait_ms(), 100);
    }
}
