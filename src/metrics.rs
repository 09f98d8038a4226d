// Prometheus metrics for the planner backend.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Composite teams built.
    pub static ref COMPOSITES_BUILT_TOTAL: IntCounter = IntCounter::new(
        "swarfarm_composites_built_total",
        "Composite teams built",
    )
    .unwrap();

    /// Speed tunes deleted as redundant, by pass (team, monster).
    pub static ref SPEED_TUNES_REMOVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("swarfarm_speed_tunes_removed_total", "Redundant speed tunes deleted"),
        &["pass"],
    )
    .unwrap();

    /// Team-wide passes aborted on a cyclic constraint.
    pub static ref CYCLIC_CONSTRAINTS_TOTAL: IntCounter = IntCounter::new(
        "swarfarm_cyclic_constraints_total",
        "Elimination passes aborted on a cycle",
    )
    .unwrap();

    /// Nested team writes, by action (create, update).
    pub static ref TEAMS_SAVED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("swarfarm_teams_saved_total", "Nested team writes"),
        &["action"],
    )
    .unwrap();

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("swarfarm_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Speed tunes per team graph handed to the team-wide pass.
    pub static ref ELIMINATION_GRAPH_SIZE: Histogram = Histogram::with_opts(
        HistogramOpts::new("swarfarm_elimination_graph_size", "Speed tunes per eliminated team")
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0]),
    )
    .unwrap();

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "swarfarm_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["endpoint"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(COMPOSITES_BUILT_TOTAL.clone()),
        Box::new(SPEED_TUNES_REMOVED_TOTAL.clone()),
        Box::new(CYCLIC_CONSTRAINTS_TOTAL.clone()),
        Box::new(TEAMS_SAVED_TOTAL.clone()),
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(ELIMINATION_GRAPH_SIZE.clone()),
        Box::new(API_REQUEST_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        // Already registered when called twice (tests)
        if let Err(e) = REGISTRY.register(c) {
            tracing::debug!("Metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Normalize a URL path for metric labels: replace numeric path segments with `:id`
/// to prevent cardinality explosion.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.parse::<i64>().is_ok() {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
