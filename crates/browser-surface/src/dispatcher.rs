//! Low-level CDP action dispatcher. Exists precisely because deterministic
//! cache replay needs to reproduce the byte-for-byte effect of a prior
//! action without re-planning: every call here is a direct `Input.*`
//! command, nothing is resolved or retried.

use cdp_client::CdpClient;
use serde_json::json;

use crate::error::SurfaceError;
use crate::types::MouseButton;

pub struct CdpActionDispatcher {
    client: CdpClient,
    session_id: String,
}

impl CdpActionDispatcher {
    pub fn new(client: CdpClient, session_id: impl Into<String>) -> Self {
        Self {
            client,
            session_id: session_id.into(),
        }
    }

    /// Moved -> pressed -> released, repeating press/release `count` times
    /// at the same location. Mirrors `Input.dispatchMouseEvent` byte for
    /// byte so a cached plan replays identically to its original run.
    pub async fn click(
        &self,
        x: f64,
        y: f64,
        button: MouseButton,
        count: u32,
    ) -> Result<(), SurfaceError> {
        self.send(
            "Input.dispatchMouseEvent",
            json!({ "type": "mouseMoved", "x": x, "y": y }),
        )
        .await?;

        let btn = button.as_cdp_str();
        for _ in 0..count.max(1) {
            self.send(
                "Input.dispatchMouseEvent",
                json!({
                    "type": "mousePressed",
                    "x": x,
                    "y": y,
                    "button": btn,
                    "clickCount": 1,
                }),
            )
            .await?;
            self.send(
                "Input.dispatchMouseEvent",
                json!({
                    "type": "mouseReleased",
                    "x": x,
                    "y": y,
                    "button": btn,
                    "clickCount": 1,
                }),
            )
            .await?;
        }
        Ok(())
    }

    /// One atomic `Input.insertText` command; there is no keystroke-level
    /// replay here by design.
    pub async fn type_text(&self, text: &str) -> Result<(), SurfaceError> {
        self.send("Input.insertText", json!({ "text": text })).await?;
        Ok(())
    }

    /// `keyDown` then `keyUp` for a single key.
    pub async fn key_press(&self, key: &str) -> Result<(), SurfaceError> {
        self.send(
            "Input.dispatchKeyEvent",
            json!({ "type": "keyDown", "text": key, "unmodifiedText": key }),
        )
        .await?;
        self.send(
            "Input.dispatchKeyEvent",
            json!({ "type": "keyUp", "text": key, "unmodifiedText": key }),
        )
        .await?;
        Ok(())
    }

    async fn send(&self, method: &str, params: serde_json::Value) -> Result<(), SurfaceError> {
        self.client
            .send_in_session(&self.session_id, method, params)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The dispatcher's contract is "exact command sequence", verified at
    // the cache-replay level against an in-process mock CDP server (see
    // tests/cache_replay.rs at the workspace root). Unit tests here stay
    // to the pure, non-networked surface.

    #[test]
    fn mouse_button_maps_to_cdp_strings() {
        assert_eq!(MouseButton::Left.as_cdp_str(), "left");
        assert_eq!(MouseButton::Right.as_cdp_str(), "right");
        assert_eq!(MouseButton::Middle.as_cdp_str(), "middle");
    }
}
