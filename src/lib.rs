//! Binary-side wiring for the Session Execution Engine: configuration,
//! metrics, and the thin server shell (`/health`, `/metrics`, `/ws`).
//! Session creation and the Agent's planning loop are supplied by
//! embedding applications through `session_engine::SessionEngine`
//! directly; this crate does not expose a session-creation HTTP surface.
pub mod config;
pub mod metrics;
mod server;

pub use config::EngineConfig;
pub use server::{build_router, ServeState};
