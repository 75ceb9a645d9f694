//! High-level, selector-based action backend: the semantic counterpart to
//! the CDP Action Dispatcher. Each call resolves a selector against the
//! session's current page and returns success/error; there is no replay
//! guarantee here, unlike the low-level dispatcher.

use std::time::Duration;

use base64::Engine;
use cdp_client::CdpClient;
use serde_json::json;

use crate::error::SurfaceError;
use crate::types::{ScreenshotFormat, ScreenshotOptions, WaitGate};

pub struct HighLevelActions {
    client: CdpClient,
    session_id: String,
}

impl HighLevelActions {
    pub fn new(client: CdpClient, session_id: impl Into<String>) -> Self {
        Self {
            client,
            session_id: session_id.into(),
        }
    }

    pub async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        self.client
            .send_in_session(&self.session_id, "Page.navigate", json!({ "url": url }))
            .await?;
        Ok(())
    }

    pub async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
        let expr = click_expression(selector);
        self.evaluate_js(&expr).await.map(|_| ())
    }

    pub async fn type_into(&self, selector: &str, text: &str) -> Result<(), SurfaceError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
             el.focus(); el.value = {val}; el.dispatchEvent(new Event('input', {{bubbles:true}})); \
             return true; }})()",
            sel = serde_json::to_string(selector).unwrap(),
            val = serde_json::to_string(text).unwrap(),
        );
        self.evaluate_js(&expr).await.map(|_| ())
    }

    pub async fn scroll_by(&self, dx: i64, dy: i64) -> Result<(), SurfaceError> {
        let expr = format!("window.scrollBy({dx}, {dy})");
        self.evaluate_js(&expr).await.map(|_| ())
    }

    pub async fn extract_text(&self, selector: &str) -> Result<String, SurfaceError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); return el ? el.innerText : ''; }})()",
            sel = serde_json::to_string(selector).unwrap(),
        );
        let value = self.evaluate_js(&expr).await?;
        Ok(value
            .get("result")
            .and_then(|r| r.get("value"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }

    pub async fn highlight(&self, selector: &str) -> Result<(), SurfaceError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
             el.style.outline = '3px solid #ff4081'; return true; }})()",
            sel = serde_json::to_string(selector).unwrap(),
        );
        self.evaluate_js(&expr).await.map(|_| ())
    }

    /// Polls until `gate` is satisfied or `timeout` elapses.
    /// `NetworkQuiet` has no real inflight-request tracker in this
    /// surface; it is approximated by a fixed quiet window after
    /// `DomReady`.
    pub async fn wait_for(&self, gate: &WaitGate, timeout: Duration) -> Result<(), SurfaceError> {
        let deadline = tokio::time::Instant::now() + timeout;
        match gate {
            WaitGate::DomReady => {
                self.poll_until(deadline, "document.readyState === 'complete'").await
            }
            WaitGate::NetworkQuiet { window_ms, .. } => {
                self.poll_until(deadline, "document.readyState === 'complete'").await?;
                tokio::time::sleep(Duration::from_millis(*window_ms)).await;
                Ok(())
            }
            WaitGate::FrameStable { min_stable_ms } => {
                tokio::time::sleep(Duration::from_millis(*min_stable_ms)).await;
                Ok(())
            }
        }
    }

    async fn poll_until(&self, deadline: tokio::time::Instant, predicate_js: &str) -> Result<(), SurfaceError> {
        loop {
            let result = self.evaluate_js(predicate_js).await?;
            let satisfied = result
                .get("result")
                .and_then(|r| r.get("value"))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if satisfied {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SurfaceError::ActionFailed(format!(
                    "wait condition `{predicate_js}` did not settle in time"
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub async fn evaluate_js(&self, expression: &str) -> Result<serde_json::Value, SurfaceError> {
        let result = self
            .client
            .send_in_session(
                &self.session_id,
                "Runtime.evaluate",
                json!({ "expression": expression, "returnByValue": true }),
            )
            .await?;
        Ok(result)
    }

    /// Raw PNG bytes of the current page, via `Page.captureScreenshot`.
    pub async fn screenshot_png(&self) -> Result<Vec<u8>, SurfaceError> {
        let options = ScreenshotOptions::default();
        let result = self
            .client
            .send_in_session(
                &self.session_id,
                "Page.captureScreenshot",
                json!({ "format": options.format.as_cdp_str() }),
            )
            .await?;
        decode_screenshot(&result)
    }

    pub async fn screenshot_with(
        &self,
        options: &ScreenshotOptions,
    ) -> Result<Vec<u8>, SurfaceError> {
        let mut params = json!({ "format": options.format.as_cdp_str() });
        if let ScreenshotFormat::Jpeg { quality: Some(q) } = options.format {
            params["quality"] = json!(q);
        }
        if let Some(clip) = &options.clip {
            params["clip"] = json!({
                "x": clip.x, "y": clip.y, "width": clip.width, "height": clip.height, "scale": clip.scale,
            });
        }
        let result = self
            .client
            .send_in_session(&self.session_id, "Page.captureScreenshot", params)
            .await?;
        decode_screenshot(&result)
    }
}

fn decode_screenshot(result: &serde_json::Value) -> Result<Vec<u8>, SurfaceError> {
    let data = result
        .get("data")
        .and_then(|v| v.as_str())
        .ok_or_else(|| SurfaceError::ActionFailed("screenshot response missing data".into()))?;
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|err| SurfaceError::ActionFailed(format!("invalid base64 screenshot: {err}")))
}

fn click_expression(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({sel}); if (!el) return false; \
         el.click(); return true; }})()",
        sel = serde_json::to_string(selector).unwrap(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn click_expression_embeds_selector_safely() {
        let expr = click_expression("button[data-role=\"submit\"]");
        assert!(expr.contains("document.querySelector"));
        assert!(expr.contains("submit"));
    }

    #[test]
    fn decode_screenshot_rejects_missing_data() {
        let err = decode_screenshot(&json!({})).unwrap_err();
        matches!(err, SurfaceError::ActionFailed(_));
    }
}
