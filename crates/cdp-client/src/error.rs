use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum CdpErrorKind {
    #[error("transport io error")]
    Io,
    #[error("command timed out")]
    Timeout,
    #[error("remote returned an error response")]
    Remote,
    #[error("transport closed")]
    Closed,
    #[error("command cancelled")]
    Cancelled,
    #[error("internal error")]
    Internal,
}

/// Error returned by the CDP Client. Carries an optional remediation hint
/// and a `retriable` flag so callers can decide whether to retry a command
/// without string-matching the message.
#[derive(Debug, Clone)]
pub struct CdpError {
    pub kind: CdpErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
    pub data: Option<Value>,
}

impl CdpError {
    pub fn new(kind: CdpErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
            data: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, retriable: bool) -> Self {
        self.retriable = retriable;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl std::fmt::Display for CdpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{}: {}", self.kind, hint),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for CdpError {}
