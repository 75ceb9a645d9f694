use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use notify_fabric::NotificationFabric;
use session_engine::SessionEngine;

use crate::config::EngineConfig;

#[derive(Clone)]
pub struct ServeState {
    pub config: Arc<EngineConfig>,
    pub engine: Arc<SessionEngine>,
    pub fabric: NotificationFabric,
    pub health: Arc<ServeHealth>,
}

impl ServeState {
    pub fn new(config: Arc<EngineConfig>, engine: Arc<SessionEngine>, fabric: NotificationFabric) -> Self {
        Self {
            config,
            engine,
            fabric,
            health: Arc::new(ServeHealth::new()),
        }
    }

    pub fn health_snapshot(&self) -> ServeHealthSnapshot {
        self.health.snapshot()
    }
}

#[derive(Default)]
pub struct ServeHealth {
    live: AtomicBool,
    ready: AtomicBool,
    last_ready_check: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl ServeHealth {
    pub fn new() -> Self {
        let health = Self::default();
        health.live.store(true, Ordering::SeqCst);
        health.ready.store(true, Ordering::SeqCst);
        health
    }

    pub fn mark_unready(&self, error: impl Into<String>) {
        self.ready.store(false, Ordering::SeqCst);
        self.update_last_check();
        *self.last_error.lock().expect("health lock poisoned") = Some(error.into());
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.update_last_check();
        *self.last_error.lock().expect("health lock poisoned") = None;
    }

    fn update_last_check(&self) {
        if let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) {
            self.last_ready_check.store(duration.as_secs(), Ordering::SeqCst);
        }
    }

    pub fn snapshot(&self) -> ServeHealthSnapshot {
        let last_ready_check = match self.last_ready_check.load(Ordering::SeqCst) {
            0 => None,
            value => Some(value),
        };
        ServeHealthSnapshot {
            ready: self.ready.load(Ordering::SeqCst),
            live: self.live.load(Ordering::SeqCst),
            last_ready_check,
            last_error: self.last_error.lock().expect("health lock poisoned").clone(),
        }
    }
}

pub struct ServeHealthSnapshot {
    pub ready: bool,
    pub live: bool,
    pub last_ready_check: Option<u64>,
    pub last_error: Option<String>,
}
