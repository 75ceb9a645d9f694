//! The external collaborator boundary for post-session summarization,
//! mirroring `driver::AgentDriver`'s shape: callers supply an LLM-backed
//! implementation, the engine never reaches into it beyond this trait.
use async_trait::async_trait;

use crate::model::SessionRecord;

#[async_trait]
pub trait SummaryGenerator: Send + Sync {
    /// Produces a short natural-language summary of a finished session.
    /// `None` means generation failed or had nothing useful to say; the
    /// caller treats this as best-effort and never fails the session over
    /// it.
    async fn summarize(&self, record: &SessionRecord) -> Option<String>;
}
