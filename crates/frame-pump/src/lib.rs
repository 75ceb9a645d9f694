//! Frame Pump: the long-running task that keeps a session's subscribers
//! fed with a visual stream of the active page, either by riding CDP's
//! screencast or, failing that, by polling and diffing screenshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use browser_surface::{HighLevelActions, ScreenshotFormat, ScreenshotOptions};
use cdp_client::CdpClient;
use engine_core_types::SessionId;
use notify_fabric::{EventName, NotificationFabric};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const IDLE_SLEEP: Duration = Duration::from_millis(500);
const MAX_CONSECUTIVE_FAILURES: u32 = 10;

/// Handle to a running Frame Pump task. At most one exists per session.
pub struct FramePumpHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl FramePumpHandle {
    /// Cancels the pump and awaits teardown. The task is expected to
    /// release its CDP session and exit within ~1s of this call.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.task).await;
    }
}

/// Starts the Frame Pump for `session_id`. Prefers CDP screencast when
/// `cdp` is available; otherwise polls via `actions`.
pub fn start(
    session_id: SessionId,
    cdp: Option<CdpClient>,
    actions: Arc<HighLevelActions>,
    fabric: NotificationFabric,
) -> FramePumpHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    let task = tokio::spawn(async move {
        let outcome = match cdp {
            Some(client) => run_screencast(&session_id, &client, &fabric, &task_cancel).await,
            None => Ok(()),
        };

        if outcome.is_err() {
            tracing::info!(
                target: "frame_pump",
                session = %session_id,
                "screencast unavailable, falling back to polling"
            );
            run_polling(&session_id, &actions, &fabric, &task_cancel).await;
        }
    });

    FramePumpHandle { cancel, task }
}

async fn run_screencast(
    session_id: &SessionId,
    client: &CdpClient,
    fabric: &NotificationFabric,
    cancel: &CancellationToken,
) -> Result<(), ()> {
    let mut frames = client.on_event("Page.screencastFrame").await;

    client
        .send(
            "Page.startScreencast",
            json!({
                "format": "jpeg",
                "quality": 60,
                "maxWidth": 1280,
                "maxHeight": 720,
                "everyNthFrame": 2,
            }),
        )
        .await
        .map_err(|_| ())?;

    let frame_counter = AtomicU64::new(0);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                let frame_id = frame_counter.fetch_add(1, Ordering::SeqCst);
                let data = frame
                    .params
                    .get("data")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();

                fabric.publish(
                    session_id,
                    EventName::ScreenshotStream,
                    json!({
                        "sessionId": session_id.0,
                        "screenshot": data,
                        "format": "jpeg",
                        "frameId": frame_id,
                    }),
                );
                engine_metrics::record_stream_frame("screencast");

                // Ack is required for flow control; without it the
                // browser stops emitting frames.
                let _ = client
                    .send(
                        "Page.screencastFrameAck",
                        json!({ "sessionId": frame.session_id }),
                    )
                    .await;
            }
            _ = tokio::time::sleep(IDLE_SLEEP) => {
                if client.is_closed() {
                    break;
                }
            }
        }
    }

    let _ = client.send("Page.stopScreencast", json!({})).await;
    Ok(())
}

async fn run_polling(
    session_id: &SessionId,
    actions: &Arc<HighLevelActions>,
    fabric: &NotificationFabric,
    cancel: &CancellationToken,
) {
    let mut last_prefix_hash: Option<u64> = None;
    let mut consecutive_failures = 0u32;
    let mut frame_id: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(IDLE_SLEEP) => {}
        }
        if cancel.is_cancelled() {
            break;
        }

        let options = ScreenshotOptions {
            clip: None,
            format: ScreenshotFormat::Jpeg { quality: Some(60) },
        };
        match actions.screenshot_with(&options).await {
            Ok(bytes) => {
                consecutive_failures = 0;
                let hash = prefix_hash(&bytes);
                if last_prefix_hash != Some(hash) {
                    last_prefix_hash = Some(hash);
                    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                    fabric.publish(
                        session_id,
                        EventName::ScreenshotStream,
                        json!({
                            "sessionId": session_id.0,
                            "screenshot": encoded,
                            "format": "jpeg",
                            "frameId": frame_id,
                        }),
                    );
                    engine_metrics::record_stream_frame("polling");
                    frame_id += 1;
                }
            }
            Err(err) => {
                consecutive_failures += 1;
                tracing::debug!(target: "frame_pump", %err, consecutive_failures, "polling screenshot failed");
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    fabric.publish(
                        session_id,
                        EventName::StreamError,
                        json!({ "sessionId": session_id.0, "msg": "screenshot polling failed repeatedly" }),
                    );
                    break;
                }
            }
        }
    }
}

/// Hash of the leading 1KB of a screenshot, used to decide whether a new
/// frame differs enough from the last one to publish.
fn prefix_hash(bytes: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let prefix = &bytes[..bytes.len().min(1024)];
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    prefix.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_hash_changes_with_content() {
        let a = prefix_hash(b"hello world");
        let b = prefix_hash(b"hello there");
        assert_ne!(a, b);
    }

    #[test]
    fn prefix_hash_stable_for_identical_input() {
        let a = prefix_hash(b"same bytes");
        let b = prefix_hash(b"same bytes");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn stop_resolves_quickly_with_no_cdp() {
        use notify_fabric::NotificationFabric;

        let fabric = NotificationFabric::new();
        let session_id = SessionId::new();
        // No real browser-surface actions available in a unit test without
        // a live page; exercise just the cancellation plumbing by
        // spawning a task that waits on the same token shape used above.
        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        let task = tokio::spawn(async move {
            cancel2.cancelled().await;
        });
        let handle = FramePumpHandle { cancel, task };
        let start = tokio::time::Instant::now();
        handle.stop().await;
        assert!(start.elapsed() < Duration::from_secs(2));
        let _ = (&fabric, &session_id);
    }
}
