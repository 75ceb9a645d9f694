//! The one Prometheus registry every crate in the workspace records
//! against. Lives below the binary so `cdp-client`, `action-cache`, and
//! `frame-pump` can record their own metrics without depending on the
//! binary crate that exposes `/metrics`.
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{histogram_opts, HistogramVec, IntCounterVec, Opts, Registry};
use tracing::error;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

static SESSION_OUTCOMES: OnceCell<IntCounterVec> = OnceCell::new();
static STEP_LATENCY: OnceCell<HistogramVec> = OnceCell::new();
static CACHE_EVENTS: OnceCell<IntCounterVec> = OnceCell::new();
static STREAM_FRAMES: OnceCell<IntCounterVec> = OnceCell::new();
static CDP_COMMAND_LATENCY: OnceCell<HistogramVec> = OnceCell::new();

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        register_session_metrics(registry);
        register_cache_metrics(registry);
        register_stream_metrics(registry);
        register_cdp_metrics(registry);
    });
}

fn register_session_metrics(registry: &Registry) {
    let outcomes = IntCounterVec::new(
        Opts::new("engine_session_terminal_total", "Sessions reaching a terminal state, by outcome"),
        &["outcome"],
    )
    .expect("create session outcome counter");
    if let Err(err) = registry.register(Box::new(outcomes.clone())) {
        error!(?err, "failed to register session outcome counter");
    }
    let _ = SESSION_OUTCOMES.set(outcomes);

    let latency = HistogramVec::new(
        histogram_opts!(
            "engine_agent_step_latency_ms",
            "Latency of one Agent observe-think-act step",
            vec![50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]
        ),
        &["result"],
    )
    .expect("create step latency histogram");
    if let Err(err) = registry.register(Box::new(latency.clone())) {
        error!(?err, "failed to register step latency histogram");
    }
    let _ = STEP_LATENCY.set(latency);
}

fn register_cache_metrics(registry: &Registry) {
    let events = IntCounterVec::new(
        Opts::new("engine_action_cache_events_total", "Action cache lookups by result"),
        &["event"],
    )
    .expect("create cache event counter");
    if let Err(err) = registry.register(Box::new(events.clone())) {
        error!(?err, "failed to register action cache counter");
    }
    let _ = CACHE_EVENTS.set(events);
}

fn register_stream_metrics(registry: &Registry) {
    let frames = IntCounterVec::new(
        Opts::new("engine_frame_pump_frames_total", "Frames published by the Frame Pump"),
        &["source"],
    )
    .expect("create frame pump counter");
    if let Err(err) = registry.register(Box::new(frames.clone())) {
        error!(?err, "failed to register frame pump counter");
    }
    let _ = STREAM_FRAMES.set(frames);
}

fn register_cdp_metrics(registry: &Registry) {
    let latency = HistogramVec::new(
        histogram_opts!(
            "engine_cdp_command_latency_ms",
            "CDP command round-trip latency",
            vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
        ),
        &["method"],
    )
    .expect("create cdp command latency histogram");
    if let Err(err) = registry.register(Box::new(latency.clone())) {
        error!(?err, "failed to register cdp command latency histogram");
    }
    let _ = CDP_COMMAND_LATENCY.set(latency);
}

pub fn record_session_outcome(outcome: &str) {
    register_metrics();
    if let Some(counter) = SESSION_OUTCOMES.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

pub fn observe_step_latency(result: &str, millis: f64) {
    register_metrics();
    if let Some(histogram) = STEP_LATENCY.get() {
        histogram.with_label_values(&[result]).observe(millis);
    }
}

pub fn record_cache_event(event: &str) {
    register_metrics();
    if let Some(counter) = CACHE_EVENTS.get() {
        counter.with_label_values(&[event]).inc();
    }
}

pub fn record_stream_frame(source: &str) {
    register_metrics();
    if let Some(counter) = STREAM_FRAMES.get() {
        counter.with_label_values(&[source]).inc();
    }
}

pub fn observe_cdp_command(method: &str, millis: f64) {
    register_metrics();
    if let Some(histogram) = CDP_COMMAND_LATENCY.get() {
        histogram.with_label_values(&[method]).observe(millis);
    }
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}
