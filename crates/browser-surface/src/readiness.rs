//! CDP readiness probe: confirms a remote browser's DevTools endpoint is
//! up and discovers the page-level WebSocket URL to attach to.

use std::time::Duration;

use serde::Deserialize;

use crate::error::SurfaceError;

#[derive(Debug, Deserialize)]
struct TargetInfo {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: Option<String>,
}

/// Polls `GET {cdp_base_url}/json/version` until it returns 200 with a
/// parseable body, or `timeout` elapses.
pub async fn wait_for_ready(
    cdp_base_url: &str,
    timeout: Duration,
) -> Result<(), SurfaceError> {
    let client = reqwest::Client::new();
    let url = format!("{}/json/version", cdp_base_url.trim_end_matches('/'));
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        let attempt = client.get(&url).timeout(Duration::from_secs(2)).send().await;
        if let Ok(resp) = attempt {
            if resp.status().is_success() && resp.json::<serde_json::Value>().await.is_ok() {
                return Ok(());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(SurfaceError::ActionFailed(format!(
                "Could not connect to browser DevTools endpoint at {cdp_base_url} within {timeout:?}"
            )));
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
}

/// Discovers the first `type=page` target's WebSocket debugger URL from
/// `GET {cdp_base_url}/json/list`.
pub async fn discover_page_ws_url(cdp_base_url: &str) -> Result<String, SurfaceError> {
    let url = format!("{}/json/list", cdp_base_url.trim_end_matches('/'));
    let targets: Vec<TargetInfo> = reqwest::get(&url)
        .await
        .map_err(|err| SurfaceError::ActionFailed(format!("json/list request failed: {err}")))?
        .json()
        .await
        .map_err(|err| SurfaceError::ActionFailed(format!("json/list parse failed: {err}")))?;

    targets
        .into_iter()
        .find(|t| t.kind == "page")
        .and_then(|t| t.ws_url)
        .ok_or_else(|| SurfaceError::ActionFailed("no page target in json/list".into()))
}
