use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VisionErrorKind {
    #[error("failed to decode image")]
    Decode,
    #[error("failed to encode image")]
    Encode,
    #[error("no marks recorded for this session")]
    NoMarks,
    #[error("mark not found")]
    NotFound,
}

#[derive(Debug)]
pub struct VisionError {
    pub kind: VisionErrorKind,
    pub message: String,
}

impl VisionError {
    pub fn new(kind: VisionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Decode, message)
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(VisionErrorKind::Encode, message)
    }

    pub fn no_marks() -> Self {
        Self::new(VisionErrorKind::NoMarks, "no marks recorded for this session")
    }

    pub fn not_found(mark_id: u32) -> Self {
        Self::new(VisionErrorKind::NotFound, format!("mark {mark_id} not found"))
    }
}

impl std::fmt::Display for VisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for VisionError {}
