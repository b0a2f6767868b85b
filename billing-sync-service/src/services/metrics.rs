//! Prometheus metrics for billing-sync-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Bulk sync job runs by job and terminal status.
pub static SYNC_JOBS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "billing_sync_jobs_total",
        "Total number of bulk sync job runs",
        &["job", "status"]
    )
    .expect("Failed to register SYNC_JOBS")
});

/// Records written by sync jobs and webhook events.
pub static SYNC_RECORDS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "billing_sync_records_total",
        "Total number of records synchronized",
        &["context"]
    )
    .expect("Failed to register SYNC_RECORDS")
});

pub static WEBHOOK_EVENTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "billing_sync_webhook_events_total",
        "Total number of webhook events received",
        &["event_type", "outcome"]
    )
    .expect("Failed to register WEBHOOK_EVENTS")
});

/// Remote billing API call duration by endpoint.
pub static REMOTE_API_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "billing_sync_remote_api_duration_seconds",
        "Remote billing API call duration in seconds",
        &["endpoint", "status"],
        vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register REMOTE_API_DURATION")
});

pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "billing_sync_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "billing_sync_errors_total",
        "Total number of synchronization errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&SYNC_JOBS);
    Lazy::force(&SYNC_RECORDS);
    Lazy::force(&WEBHOOK_EVENTS);
    Lazy::force(&REMOTE_API_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ERRORS);
}

/// Domain metrics followed by the HTTP request metrics, in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    let mut output = String::from_utf8_lossy(&buffer).into_owned();
    output.push_str(&service_core::middleware::metrics::render_http_metrics());
    output
}

pub fn record_sync_job(job: &str, status: &str) {
    SYNC_JOBS.with_label_values(&[job, status]).inc();
}

pub fn record_synced_records(context: &str, count: u64) {
    SYNC_RECORDS.with_label_values(&[context]).inc_by(count as f64);
}

pub fn record_webhook_event(event_type: &str, outcome: &str) {
    WEBHOOK_EVENTS.with_label_values(&[event_type, outcome]).inc();
}

pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
