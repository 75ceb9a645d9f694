//! Per-step screenshot capture with a four-strategy fallback, each
//! attempt capped at 3s. The first strategy to yield bytes wins; all
//! four failing is logged and does not abort the step.
use std::time::Duration;

use browser_surface::{HighLevelActions, PageRegistry, WaitGate};

const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(3);
const RETRY_PAUSE: Duration = Duration::from_millis(300);
const LOAD_SETTLE_PAUSE: Duration = Duration::from_millis(500);

pub async fn capture_with_fallback(actions: &HighLevelActions, registry: &PageRegistry) -> Option<Vec<u8>> {
    if let Some(bytes) = attempt(actions.screenshot_png()).await {
        return Some(bytes);
    }

    tokio::time::sleep(RETRY_PAUSE).await;
    if registry.active_page().is_some() {
        if let Some(bytes) = attempt(actions.screenshot_png()).await {
            return Some(bytes);
        }
    }

    let network_quiet = WaitGate::NetworkQuiet {
        window_ms: 300,
        max_inflight: 0,
    };
    if actions.wait_for(&network_quiet, ATTEMPT_TIMEOUT).await.is_ok() {
        if let Some(bytes) = attempt(actions.screenshot_png()).await {
            return Some(bytes);
        }
    }

    if actions.wait_for(&WaitGate::DomReady, ATTEMPT_TIMEOUT).await.is_ok() {
        tokio::time::sleep(LOAD_SETTLE_PAUSE).await;
        if let Some(bytes) = attempt(actions.screenshot_png()).await {
            return Some(bytes);
        }
    }

    tracing::debug!(target: "session_engine::screenshot", "all four capture strategies failed");
    None
}

async fn attempt<F>(fut: F) -> Option<Vec<u8>>
where
    F: std::future::Future<Output = Result<Vec<u8>, browser_surface::SurfaceError>>,
{
    match tokio::time::timeout(ATTEMPT_TIMEOUT, fut).await {
        Ok(Ok(bytes)) => Some(bytes),
        Ok(Err(err)) => {
            tracing::debug!(target: "session_engine::screenshot", %err, "capture attempt failed");
            None
        }
        Err(_) => {
            tracing::debug!(target: "session_engine::screenshot", "capture attempt timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browser_surface::PageRegistry;

    #[test]
    fn registry_with_no_pages_has_no_active_page() {
        let registry = PageRegistry::new();
        assert!(registry.active_page().is_none());
    }
}
