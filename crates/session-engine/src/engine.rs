//! Session Engine: the orchestrator that drives one session through the
//! full lifecycle — cache-hit replay, the Agent loop, the Frame Pump,
//! optional Vision, and the cooperative termination sequence.
use std::sync::Arc;
use std::time::Duration;

use action_cache::ActionCache;
use browser_surface::{readiness, CdpActionDispatcher, HighLevelActions, PageRegistry};
use cdp_client::CdpClient;
use engine_core_types::SessionId;
use notify_fabric::{EventName, NotificationFabric};
use serde_json::json;
use vision_grounding::SetOfMarks;

use crate::agent_loop::{AgentLoop, AgentLoopOutcome};
use crate::cacheable::extract;
use crate::driver::AgentDriver;
use crate::error::{SessionError, SessionErrorKind};
use crate::model::{BrowserMode, SessionRecord, SessionStatus, StartSessionRequest, StepOutcome};
use crate::registry::{SessionRegistry, StopReason};
use crate::replay;
use crate::screenshot::capture_with_fallback;
use crate::summary::SummaryGenerator;

const CDP_READY_TIMEOUT: Duration = Duration::from_secs(15);
const TERMINATION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SessionEngine {
    registry: SessionRegistry,
    cache: Arc<ActionCache>,
    fabric: NotificationFabric,
    vision: Arc<SetOfMarks>,
    summary_generator: Option<Arc<dyn SummaryGenerator>>,
}

impl SessionEngine {
    pub fn new(cache: Arc<ActionCache>, fabric: NotificationFabric) -> Self {
        Self {
            registry: SessionRegistry::new(),
            cache,
            fabric,
            vision: Arc::new(SetOfMarks::new()),
            summary_generator: None,
        }
    }

    /// Supplies the collaborator that produces a post-session summary.
    /// Without one, sessions simply terminate with `summary: None` —
    /// summarization is best-effort, not a required capability.
    pub fn with_summary_generator(mut self, generator: Arc<dyn SummaryGenerator>) -> Self {
        self.summary_generator = Some(generator);
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Drives a session from `pending` through to a terminal state.
    /// Returns once the session has reached that state; callers that
    /// want this to run in the background should spawn it themselves.
    pub async fn start(&self, agent: Arc<dyn AgentDriver>, request: StartSessionRequest) -> SessionId {
        let session_id = SessionId::new();
        let record = SessionRecord::new(session_id.0.clone(), request.task.clone(), request.agent_config.max_steps);
        let handle = self.registry.create(session_id.clone(), record);
        handle.attach_agent(agent.clone());
        handle.set_status(SessionStatus::Active);

        self.fabric.publish(
            &session_id,
            EventName::SessionStart,
            json!({ "sessionId": session_id.0, "status": "active", "maxSteps": request.agent_config.max_steps }),
        );

        if let Some(plan) = self.cache.get(&request.task, &request.url) {
            if !plan.is_empty() {
                if let Ok(()) = self.try_replay(&session_id, &request, &plan).await {
                    self.registry.remove(&session_id);
                    return session_id;
                }
                tracing::info!(target: "session_engine", session = %session_id, "replay failed, falling back to agent loop");
            }
        }

        if let Err(err) = self.run_agent_path(&session_id, agent, &request).await {
            self.fail(&session_id, &err);
        }

        self.registry.remove(&session_id);
        session_id
    }

    async fn try_replay(
        &self,
        session_id: &SessionId,
        request: &StartSessionRequest,
        plan: &[action_cache::CachedAction],
    ) -> Result<(), SessionError> {
        self.fabric.publish(
            session_id,
            EventName::SessionUpdate,
            json!({ "sessionId": session_id.0, "message": "Instant Replay: executing cached plan" }),
        );

        let (client, dispatcher) = self.connect(request).await?;
        let handle = self.registry.get(session_id).ok_or_else(SessionError::cancellation)?;
        handle.attach_cdp_client(client);
        handle.attach_dispatcher(Arc::new(dispatcher));
        let dispatcher = handle.dispatcher().expect("dispatcher just attached");

        replay::replay(&dispatcher, plan).await?;

        handle.update(|record| {
            record.status = SessionStatus::Completed;
            record.completed_at = Some(chrono::Utc::now());
            record.actions_count = plan.len() as u32;
            record.result = Some(json!({ "success": true, "method": "replay" }));
        });
        engine_metrics::record_session_outcome("completed");
        self.fabric.publish(
            session_id,
            EventName::SessionComplete,
            json!({ "sessionId": session_id.0, "result": { "success": true, "method": "replay" } }),
        );
        Ok(())
    }

    async fn run_agent_path(
        &self,
        session_id: &SessionId,
        agent: Arc<dyn AgentDriver>,
        request: &StartSessionRequest,
    ) -> Result<(), SessionError> {
        let (client, dispatcher) = self.connect(request).await?;
        let handle = self.registry.get(session_id).ok_or_else(SessionError::cancellation)?;
        handle.attach_cdp_client(client.clone());
        let dispatcher = Arc::new(dispatcher);
        handle.attach_dispatcher(dispatcher.clone());

        let actions = Arc::new(HighLevelActions::new(client.clone(), String::new()));
        let page_registry = Arc::new(PageRegistry::new());
        page_registry.page_opened(engine_core_types::PageId::new());

        handle.attach_actions(actions.clone());
        let frame_pump = frame_pump::start(session_id.clone(), Some(client.clone()), actions.clone(), self.fabric.clone());
        handle.attach_frame_pump(frame_pump);

        let vision_enabled = request.agent_config.enable_owl_vision;
        let started = std::time::Instant::now();

        let cancel = handle.cancel_token();
        let loop_runner = AgentLoop::new(cancel, request.agent_config.max_steps);
        let history = Arc::new(parking_lot::Mutex::new(Vec::<crate::model::StepObservation>::new()));
        let recorded_all = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let outcome = loop_runner
            .run(|step| {
                let handle = handle.clone();
                let agent = agent.clone();
                let actions = actions.clone();
                let page_registry = page_registry.clone();
                let vision = self.vision.clone();
                let fabric = self.fabric.clone();
                let session_id = session_id.clone();
                let history = history.clone();
                let recorded_all = recorded_all.clone();
                async move {
                    while handle.is_paused() && !handle.is_cancelled() {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    if handle.is_cancelled() {
                        return Err(SessionError::cancellation());
                    }

                    let history_snapshot: Vec<_> = history.lock().clone();
                    let step_started = std::time::Instant::now();
                    let step_result = agent.step(step, &history_snapshot).await;
                    engine_metrics::observe_step_latency(
                        if step_result.is_ok() { "ok" } else { "err" },
                        step_started.elapsed().as_secs_f64() * 1000.0,
                    );
                    let (observation, outcome, step_actions) = step_result?;
                    history.lock().push(observation.clone());
                    recorded_all.lock().extend(step_actions);

                    if handle.is_cancelled() {
                        return Ok((observation, StepOutcome::Cancel));
                    }

                    if let Some(bytes) = capture_with_fallback(&actions, &page_registry).await {
                        let encoded = base64_encode(&bytes);
                        fabric.publish(
                            &session_id,
                            EventName::Screenshot,
                            json!({ "sessionId": session_id.0, "screenshot": encoded, "step": step }),
                        );
                        if vision_enabled {
                            match vision.mark(&session_id, &bytes) {
                                Ok(marked) => fabric.publish(
                                    &session_id,
                                    EventName::OwlVision,
                                    json!({
                                        "sessionId": session_id.0,
                                        "annotatedImage": marked.annotated_image_base64,
                                        "marksCount": marked.marks.len(),
                                        "description": marked.description,
                                    }),
                                ),
                                Err(err) => tracing::debug!(target: "session_engine", %err, "vision marking failed"),
                            }
                        }
                    }

                    fabric.publish(
                        &session_id,
                        EventName::ActionLog,
                        json!({ "sessionId": session_id.0, "step": step, "action": observation.action }),
                    );
                    fabric.publish(
                        &session_id,
                        EventName::SessionUpdate,
                        json!({ "sessionId": session_id.0, "message": observation.goal.clone() }),
                    );

                    Ok((observation, outcome))
                }
            })
            .await;

        if matches!(outcome, AgentLoopOutcome::Completed { .. }) {
            let recorded_actions = std::mem::take(&mut *recorded_all.lock());
            let cached = extract(&recorded_actions);
            if !cached.is_empty() {
                let duration_ms = started.elapsed().as_millis() as u64;
                self.cache.put(&request.task, &request.url, cached, duration_ms);
            }
        }

        self.finish(session_id, &handle, outcome).await;
        Ok(())
    }

    async fn finish(&self, session_id: &SessionId, handle: &Arc<crate::registry::SessionHandle>, outcome: AgentLoopOutcome) {
        match outcome {
            AgentLoopOutcome::Completed { message, steps } => {
                handle.update(|record| {
                    record.status = SessionStatus::Completed;
                    record.completed_at = Some(chrono::Utc::now());
                    record.actions_count = steps;
                    record.result = Some(json!({ "success": true, "message": message }));
                });
                engine_metrics::record_session_outcome("completed");
                self.fabric.publish(
                    session_id,
                    EventName::SessionComplete,
                    json!({ "sessionId": session_id.0, "result": { "success": true, "message": message } }),
                );
            }
            AgentLoopOutcome::Failed { message, steps } => {
                handle.update(|record| {
                    record.status = SessionStatus::Failed;
                    record.actions_count = steps;
                    record.error_message = Some(message.clone());
                });
                engine_metrics::record_session_outcome("failed");
                self.fabric.publish(
                    session_id,
                    EventName::Error,
                    json!({ "sessionId": session_id.0, "message": message }),
                );
            }
            AgentLoopOutcome::MaxStepsReached { steps } => {
                let message = format!("reached maximum steps limit: {steps}");
                handle.update(|record| {
                    record.status = SessionStatus::Failed;
                    record.actions_count = steps;
                    record.error_message = Some(message.clone());
                });
                engine_metrics::record_session_outcome("failed");
                self.fabric.publish(
                    session_id,
                    EventName::Error,
                    json!({ "sessionId": session_id.0, "message": message }),
                );
            }
            AgentLoopOutcome::Cancelled { steps } => {
                let reason = handle.stop_reason().unwrap_or(StopReason::Cancelled);
                let status = match reason {
                    StopReason::Cancelled => SessionStatus::Cancelled,
                    StopReason::Stopped => SessionStatus::Stopped,
                };
                handle.update(|record| {
                    record.status = status;
                    record.actions_count = steps;
                });
                engine_metrics::record_session_outcome(match status {
                    SessionStatus::Stopped => "stopped",
                    _ => "cancelled",
                });
                self.fabric.publish(
                    session_id,
                    EventName::SessionStopped,
                    json!({ "sessionId": session_id.0 }),
                );
            }
        }

        self.terminate(session_id, handle).await;
    }

    async fn terminate(&self, session_id: &SessionId, handle: &Arc<crate::registry::SessionHandle>) {
        self.trigger_summary(session_id, handle);

        if let Some(pump) = handle.take_frame_pump() {
            let _ = tokio::time::timeout(TERMINATION_TIMEOUT, pump.stop()).await;
        }
        if let Some(client) = handle.take_cdp_client() {
            client.disconnect().await;
        }
        tracing::info!(target: "session_engine", session = %session_id, "session terminated");
    }

    /// Fire-and-forget: spawns the summary generation call so it never
    /// delays frame-pump teardown or CDP disconnect. The spawned task
    /// holds its own clone of `handle`, so it can still update the
    /// session record after the registry has forgotten this session id.
    fn trigger_summary(&self, session_id: &SessionId, handle: &Arc<crate::registry::SessionHandle>) {
        let Some(generator) = self.summary_generator.clone() else {
            return;
        };
        let handle = handle.clone();
        let fabric = self.fabric.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            let record = handle.record();
            match generator.summarize(&record).await {
                Some(summary) => {
                    handle.update(|record| record.summary = Some(summary.clone()));
                    fabric.publish(
                        &session_id,
                        EventName::SessionUpdate,
                        json!({ "sessionId": session_id.0, "summary": summary }),
                    );
                }
                None => {
                    tracing::debug!(target: "session_engine", session = %session_id, "summary generation produced nothing");
                }
            }
        });
    }

    fn fail(&self, session_id: &SessionId, err: &SessionError) {
        if let Some(handle) = self.registry.get(session_id) {
            handle.update(|record| {
                record.status = SessionStatus::Failed;
                record.error_message = Some(err.message.clone());
            });
        }
        engine_metrics::record_session_outcome("failed");
        self.fabric.publish(
            session_id,
            EventName::Error,
            json!({ "sessionId": session_id.0, "message": err.message, "kind": err.kind.to_string() }),
        );
    }

    async fn connect(&self, request: &StartSessionRequest) -> Result<(CdpClient, CdpActionDispatcher), SessionError> {
        match request.browser_mode {
            BrowserMode::Direct => Err(SessionError::new(
                SessionErrorKind::Config,
                "BROWSER_MODE=direct requires a locally launched browser, which this build does not provision",
            )),
            BrowserMode::Container | BrowserMode::Custom => {
                let cdp_url = request
                    .cdp_url
                    .clone()
                    .ok_or_else(|| SessionError::config("missing CDP_URL for container/custom browser mode"))?;

                readiness::wait_for_ready(&cdp_url, CDP_READY_TIMEOUT)
                    .await
                    .map_err(|err| SessionError::connectivity(err.to_string()))?;
                let ws_url = readiness::discover_page_ws_url(&cdp_url)
                    .await
                    .map_err(|err| SessionError::connectivity(err.to_string()))?;
                let client = CdpClient::connect(&ws_url)
                    .await
                    .map_err(|err| SessionError::connectivity(err.to_string()))?;
                let dispatcher = CdpActionDispatcher::new(client.clone(), String::new());
                Ok((client, dispatcher))
            }
        }
    }

    pub fn pause(&self, session_id: &SessionId) -> bool {
        match self.registry.get(session_id) {
            Some(handle) => {
                handle.set_paused(true);
                true
            }
            None => false,
        }
    }

    pub fn resume(&self, session_id: &SessionId) -> bool {
        match self.registry.get(session_id) {
            Some(handle) => {
                handle.set_paused(false);
                true
            }
            None => false,
        }
    }

    /// `user_driven=true` produces a `stopped` terminal status and a
    /// `session_stopped` event; otherwise `cancelled`. Both share the
    /// same cooperative-cancellation mechanics.
    pub fn stop(&self, session_id: &SessionId, user_driven: bool) -> bool {
        match self.registry.get(session_id) {
            Some(handle) => {
                let reason = if user_driven { StopReason::Stopped } else { StopReason::Cancelled };
                handle.request_stop(reason);
                true
            }
            None => false,
        }
    }

    pub async fn intervene(&self, session_id: &SessionId, message: &str) -> Result<bool, SessionError> {
        let handle = self
            .registry
            .get(session_id)
            .ok_or_else(|| SessionError::config("session not found"))?;
        let accepted = match handle.agent() {
            Some(agent) => agent.add_task(message).await,
            None => false,
        };
        self.fabric.publish(
            session_id,
            EventName::Intervention,
            json!({ "sessionId": session_id.0, "message": message }),
        );
        Ok(accepted)
    }

    /// Client-driven `start_stream`: (re)starts the Frame Pump for a
    /// session whose browser connection is already live. No-op if a pump
    /// is already running.
    pub fn start_stream(&self, session_id: &SessionId) -> bool {
        let Some(handle) = self.registry.get(session_id) else {
            return false;
        };
        if handle.has_frame_pump() {
            return true;
        }
        let (Some(client), Some(actions)) = (handle.cdp_client(), handle.actions()) else {
            return false;
        };
        let pump = frame_pump::start(session_id.clone(), Some(client), actions, self.fabric.clone());
        handle.attach_frame_pump(pump);
        true
    }

    /// Client-driven `stop_stream`: tears down the Frame Pump without
    /// affecting the rest of the session.
    pub async fn stop_stream(&self, session_id: &SessionId) -> bool {
        match self.registry.get(session_id) {
            Some(handle) => match handle.take_frame_pump() {
                Some(pump) => {
                    let _ = tokio::time::timeout(TERMINATION_TIMEOUT, pump.stop()).await;
                    true
                }
                None => true,
            },
            None => false,
        }
    }

    pub async fn click_by_mark(&self, session_id: &SessionId, mark_id: u32) -> Result<(f64, f64, String), SessionError> {
        let handle = self
            .registry
            .get(session_id)
            .ok_or_else(|| SessionError::config("session not found"))?;

        let ((x, y), element_type) = self
            .vision
            .click_by_mark(session_id, mark_id)
            .map_err(|err| SessionError::new(SessionErrorKind::VisionUnavailable, err.to_string()))?;

        let dispatcher = handle
            .dispatcher()
            .ok_or_else(|| SessionError::config("no active CDP dispatcher for this session"))?;
        dispatcher
            .click(x as f64, y as f64, browser_surface::MouseButton::Left, 1)
            .await
            .map_err(|err| SessionError::new(SessionErrorKind::ConnectivityToBrowser, err.to_string()))?;

        self.fabric.publish(
            session_id,
            EventName::ClickByMark,
            json!({ "sessionId": session_id.0, "markId": mark_id, "x": x, "y": y, "elementType": element_type }),
        );

        Ok((x as f64, y as f64, element_type))
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
