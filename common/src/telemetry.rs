// Telemetry module for structured logging and metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging with JSON formatting
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(
        log_level = log_level,
        "Structured logging initialized with JSON formatting"
    );

    Ok(())
}

/// Initialize Prometheus metrics exporter
///
/// Registers:
/// - task_success_total: Counter for successful task runs
/// - task_failed_total: Counter for failed task runs
/// - task_duration_seconds: Histogram for task run duration
/// - scheduled_tasks: Gauge for tasks currently scheduled
#[tracing::instrument]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!("task_success_total", "Total number of successful task runs");
    describe_counter!("task_failed_total", "Total number of failed task runs");
    describe_histogram!("task_duration_seconds", "Duration of task runs in seconds");
    describe_gauge!("scheduled_tasks", "Current number of scheduled tasks");

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

#[inline]
pub fn record_task_success(task_name: &str) {
    counter!("task_success_total", "task_name" => task_name.to_string()).increment(1);
}

#[inline]
pub fn record_task_failure(task_name: &str, reason: &str) {
    counter!(
        "task_failed_total",
        "task_name" => task_name.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

#[inline]
pub fn record_task_duration(task_name: &str, duration_seconds: f64) {
    histogram!("task_duration_seconds", "task_name" => task_name.to_string())
        .record(duration_seconds);
}

#[inline]
pub fn update_scheduled_tasks(count: usize) {
    gauge!("scheduled_tasks").set(count as f64);
}
