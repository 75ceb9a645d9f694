//! The registry and recording functions live in `engine_metrics` so every
//! crate below this binary (`cdp-client`, `action-cache`, `frame-pump`,
//! `session-engine`) can record against the same registry without
//! depending on the binary crate. This module just exposes it for the
//! `/metrics` route.
pub use engine_metrics::{
    global_registry, observe_cdp_command, observe_step_latency, record_cache_event, record_session_outcome,
    record_stream_frame, register_metrics,
};
