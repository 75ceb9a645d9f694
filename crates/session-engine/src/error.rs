use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    #[error("configuration error")]
    Config,
    #[error("could not connect to the browser")]
    ConnectivityToBrowser,
    #[error("operation timed out")]
    Timeout,
    #[error("session cancelled")]
    Cancellation,
    #[error("agent runtime error")]
    AgentRuntime,
    #[error("cached plan replay failed")]
    ReplayFailure,
    #[error("vision grounding unavailable")]
    VisionUnavailable,
}

#[derive(Debug)]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
    pub hint: Option<String>,
    pub retriable: bool,
    pub data: Option<Value>,
}

impl SessionError {
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: None,
            retriable: false,
            data: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, value: bool) -> Self {
        self.retriable = value;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Config, message)
    }

    pub fn connectivity(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::ConnectivityToBrowser, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Timeout, message)
    }

    pub fn cancellation() -> Self {
        Self::new(SessionErrorKind::Cancellation, "session cancelled")
    }

    pub fn agent_runtime(message: impl Into<String>) -> Self {
        let message: String = message.into();
        let truncated: String = message.chars().take(500).collect();
        Self::new(SessionErrorKind::AgentRuntime, truncated)
    }

    pub fn replay_failure(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::ReplayFailure, message)
    }

    pub fn vision_unavailable() -> Self {
        Self::new(SessionErrorKind::VisionUnavailable, "unavailable")
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{}: {} ({hint})", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for SessionError {}
