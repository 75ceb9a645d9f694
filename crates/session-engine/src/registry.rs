//! Session Registry: the single value that owns every session's running
//! state, replacing the source's module-level `running_agents`,
//! `running_browsers`, and `stop_flags` maps.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use browser_surface::{CdpActionDispatcher, HighLevelActions};
use cdp_client::CdpClient;
use dashmap::DashMap;
use engine_core_types::SessionId;
use frame_pump::FramePumpHandle;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::driver::AgentDriver;
use crate::model::{SessionRecord, SessionStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    Stopped,
}

pub struct SessionHandle {
    record: RwLock<SessionRecord>,
    cancel: CancellationToken,
    paused: AtomicBool,
    stop_reason: Mutex<Option<StopReason>>,
    cdp_client: Mutex<Option<CdpClient>>,
    frame_pump: Mutex<Option<FramePumpHandle>>,
    dispatcher: Mutex<Option<Arc<CdpActionDispatcher>>>,
    agent: Mutex<Option<Arc<dyn AgentDriver>>>,
    actions: Mutex<Option<Arc<HighLevelActions>>>,
}

impl SessionHandle {
    fn new(record: SessionRecord) -> Self {
        Self {
            record: RwLock::new(record),
            cancel: CancellationToken::new(),
            paused: AtomicBool::new(false),
            stop_reason: Mutex::new(None),
            cdp_client: Mutex::new(None),
            frame_pump: Mutex::new(None),
            dispatcher: Mutex::new(None),
            agent: Mutex::new(None),
            actions: Mutex::new(None),
        }
    }

    pub fn record(&self) -> SessionRecord {
        self.record.read().clone()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    /// Pause is advisory only: it stops new agent steps from being
    /// initiated, but an in-flight step always runs to completion.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, status: SessionStatus) {
        let mut record = self.record.write();
        record.status = status;
        record.updated_at = chrono::Utc::now();
    }

    pub fn update<F: FnOnce(&mut SessionRecord)>(&self, f: F) {
        let mut record = self.record.write();
        f(&mut record);
        record.updated_at = chrono::Utc::now();
    }

    pub fn attach_cdp_client(&self, client: CdpClient) {
        *self.cdp_client.lock() = Some(client);
    }

    pub fn cdp_client(&self) -> Option<CdpClient> {
        self.cdp_client.lock().clone()
    }

    pub fn take_cdp_client(&self) -> Option<CdpClient> {
        self.cdp_client.lock().take()
    }

    pub fn attach_frame_pump(&self, handle: FramePumpHandle) {
        *self.frame_pump.lock() = Some(handle);
    }

    pub fn take_frame_pump(&self) -> Option<FramePumpHandle> {
        self.frame_pump.lock().take()
    }

    pub fn attach_dispatcher(&self, dispatcher: Arc<CdpActionDispatcher>) {
        *self.dispatcher.lock() = Some(dispatcher);
    }

    pub fn dispatcher(&self) -> Option<Arc<CdpActionDispatcher>> {
        self.dispatcher.lock().clone()
    }

    pub fn attach_actions(&self, actions: Arc<HighLevelActions>) {
        *self.actions.lock() = Some(actions);
    }

    pub fn actions(&self) -> Option<Arc<HighLevelActions>> {
        self.actions.lock().clone()
    }

    pub fn has_frame_pump(&self) -> bool {
        self.frame_pump.lock().is_some()
    }

    pub fn attach_agent(&self, agent: Arc<dyn AgentDriver>) {
        *self.agent.lock() = Some(agent);
    }

    pub fn agent(&self) -> Option<Arc<dyn AgentDriver>> {
        self.agent.lock().clone()
    }

    pub fn request_stop(&self, reason: StopReason) {
        *self.stop_reason.lock() = Some(reason);
        self.cancel.cancel();
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        *self.stop_reason.lock()
    }
}

/// Owns every live session's handle. A session present here is, by
/// definition, running or about to run; removal is the single point at
/// which a session becomes invisible to `stop`/`pause`/`intervene`.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    handles: Arc<DashMap<SessionId, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, session_id: SessionId, record: SessionRecord) -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new(record));
        self.handles.insert(session_id, handle.clone());
        handle
    }

    pub fn get(&self, session_id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.handles.get(session_id).map(|h| h.value().clone())
    }

    pub fn remove(&self, session_id: &SessionId) {
        self.handles.remove(session_id);
    }

    pub fn is_running(&self, session_id: &SessionId) -> bool {
        self.handles.contains_key(session_id)
    }

    pub fn running_count(&self) -> usize {
        self.handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_disappears_from_registry_on_remove() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        registry.create(id.clone(), SessionRecord::new(id.0.clone(), "goal".into(), 5));
        assert!(registry.is_running(&id));

        registry.remove(&id);
        assert!(!registry.is_running(&id));
    }

    #[test]
    fn pause_is_advisory_and_does_not_touch_cancellation() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        let handle = registry.create(id.clone(), SessionRecord::new(id.0.clone(), "goal".into(), 5));

        handle.set_paused(true);
        assert!(handle.is_paused());
        assert!(!handle.is_cancelled());
    }
}
