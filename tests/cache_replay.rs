//! A cache-hit replay must reproduce the exact CDP command sequence a
//! cached plan was recorded with, and must never touch the Agent driver.
//! This stands up a minimal in-process CDP-shaped server (just enough of
//! `/json/version`, `/json/list`, and the page WebSocket to satisfy
//! `browser_surface::readiness` and `cdp_client::CdpClient`) and drives a
//! real `SessionEngine::start` through it.
use std::net::SocketAddr;
use std::sync::Arc;

use action_cache::{ActionCache, CachedAction};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use notify_fabric::NotificationFabric;
use parking_lot::Mutex;
use serde_json::{json, Value};
use session_engine::{
    AgentConfig, AgentDriver, BrowserMode, RecordedAction, SessionEngine, SessionError, StartSessionRequest,
    StepObservation, StepOutcome,
};

#[derive(Clone, Default)]
struct RecordedMethods(Arc<Mutex<Vec<String>>>);

#[derive(Clone)]
struct MockCdpState {
    addr: SocketAddr,
    recorded: RecordedMethods,
}

async fn json_version() -> impl IntoResponse {
    Json(json!({ "Browser": "mock/1.0", "Protocol-Version": "1.3" }))
}

async fn json_list(State(state): State<MockCdpState>) -> impl IntoResponse {
    Json(json!([
        {
            "type": "page",
            "webSocketDebuggerUrl": format!("ws://{}/devtools/page/1", state.addr),
        }
    ]))
}

async fn devtools_ws(ws: WebSocketUpgrade, State(state): State<MockCdpState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_devtools_socket(socket, state.recorded))
}

async fn handle_devtools_socket(mut socket: WebSocket, recorded: RecordedMethods) {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else { continue };
        let Ok(command) = serde_json::from_str::<Value>(&text) else { continue };
        let Some(id) = command.get("id").and_then(Value::as_u64) else { continue };
        if let Some(method) = command.get("method").and_then(Value::as_str) {
            recorded.0.lock().push(method.to_string());
        }
        let reply = json!({ "id": id, "result": {} }).to_string();
        if socket.send(Message::Text(reply)).await.is_err() {
            break;
        }
    }
}

/// Proves the replay path never reaches the Agent driver: any call panics
/// the test outright instead of silently falling through to a fallback.
struct UnreachableAgent;

#[async_trait]
impl AgentDriver for UnreachableAgent {
    async fn step(
        &self,
        _step: u32,
        _history: &[StepObservation],
    ) -> Result<(StepObservation, StepOutcome, Vec<RecordedAction>), SessionError> {
        unreachable!("cache-hit replay must not invoke the agent driver")
    }

    async fn add_task(&self, _message: &str) -> bool {
        false
    }
}

async fn spawn_mock_cdp_server() -> (SocketAddr, RecordedMethods) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind mock cdp server");
    let addr = listener.local_addr().expect("local addr");
    let recorded = RecordedMethods::default();

    let router = Router::new()
        .route("/json/version", get(json_version))
        .route("/json/list", get(json_list))
        .route("/devtools/page/1", get(devtools_ws))
        .with_state(MockCdpState { addr, recorded: recorded.clone() });

    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.expect("mock cdp server crashed");
    });

    (addr, recorded)
}

#[tokio::test]
async fn cache_hit_replay_reproduces_exact_command_sequence() {
    let (addr, recorded) = spawn_mock_cdp_server().await;

    let task = "log in and submit";
    let url = "https://example.test/login";

    let cache = ActionCache::in_memory();
    cache.put(
        task,
        url,
        vec![
            CachedAction::Click { x: 12.0, y: 34.0, wait_ms: None },
            CachedAction::TypeText { text: "hello".into(), wait_ms: None },
            CachedAction::KeyPress { key: "Enter".into(), wait_ms: None },
        ],
        1200,
    );

    let fabric = NotificationFabric::new();
    let engine = SessionEngine::new(Arc::new(cache), fabric);

    let request = StartSessionRequest {
        task: task.to_string(),
        url: url.to_string(),
        agent_config: AgentConfig::default(),
        browser_mode: BrowserMode::Container,
        cdp_url: Some(format!("http://{addr}")),
    };

    let session_id = engine.start(Arc::new(UnreachableAgent), request).await;
    assert!(!session_id.0.is_empty());

    let methods = recorded.0.lock().clone();
    assert_eq!(
        methods,
        vec![
            "Input.dispatchMouseEvent", // mouseMoved
            "Input.dispatchMouseEvent", // mousePressed
            "Input.dispatchMouseEvent", // mouseReleased
            "Input.insertText",
            "Input.dispatchKeyEvent", // keyDown
            "Input.dispatchKeyEvent", // keyUp
        ]
    );
}

#[tokio::test]
async fn direct_browser_mode_fails_fast_without_any_network_call() {
    let cache = ActionCache::in_memory();
    let fabric = NotificationFabric::new();
    let engine = SessionEngine::new(Arc::new(cache), fabric);

    let request = StartSessionRequest {
        task: "whatever".to_string(),
        url: "https://example.test".to_string(),
        agent_config: AgentConfig::default(),
        browser_mode: BrowserMode::Direct,
        cdp_url: None,
    };

    let started = std::time::Instant::now();
    let _session_id = engine.start(Arc::new(UnreachableAgent), request).await;
    assert!(started.elapsed() < std::time::Duration::from_secs(2), "Direct mode must fail immediately, not time out");
}
