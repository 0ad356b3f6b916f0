use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::info;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::errors::{ForwarderError, Result};

/// Operational telemetry: Prometheus counters/histogram plus the HTTP
/// scrape endpoint, mirroring the metric families the source system
/// exposed via `prometheus_client`.
pub struct Telemetry {
    registry: Registry,
    messages_total: IntCounterVec,
    dedup_skipped_total: IntCounterVec,
    post_success_total: IntCounter,
    post_fail_total: IntCounter,
    dlq_total: IntCounter,
    post_latency_seconds: Histogram,
    batch_rows_total: IntCounter,
    batches_total: IntCounter,
}

impl Telemetry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let messages_total = IntCounterVec::new(
            Opts::new("consumer_messages_total", "Messages consumed"),
            &["topic"],
        )?;
        let dedup_skipped_total = IntCounterVec::new(
            Opts::new(
                "consumer_dedup_skipped_total",
                "Messages skipped due to idempotency",
            ),
            &["topic"],
        )?;
        let post_success_total = IntCounter::new(
            "analytics_post_success_total",
            "Successful analytics POSTs",
        )?;
        let post_fail_total = IntCounter::new("analytics_post_fail_total", "Failed analytics POSTs")?;
        let dlq_total = IntCounter::new("analytics_dlq_total", "Messages published to analytics DLQ")?;
        let post_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "analytics_post_latency_seconds",
            "Latency of analytics POSTs in seconds",
        ))?;
        let batch_rows_total = IntCounter::new(
            "analytics_batch_rows_total",
            "Total rows included in analytics batches",
        )?;
        let batches_total = IntCounter::new("analytics_batches_total", "Total analytics batches sent")?;

        registry.register(Box::new(messages_total.clone()))?;
        registry.register(Box::new(dedup_skipped_total.clone()))?;
        registry.register(Box::new(post_success_total.clone()))?;
        registry.register(Box::new(post_fail_total.clone()))?;
        registry.register(Box::new(dlq_total.clone()))?;
        registry.register(Box::new(post_latency_seconds.clone()))?;
        registry.register(Box::new(batch_rows_total.clone()))?;
        registry.register(Box::new(batches_total.clone()))?;

        Ok(Telemetry {
            registry,
            messages_total,
            dedup_skipped_total,
            post_success_total,
            post_fail_total,
            dlq_total,
            post_latency_seconds,
            batch_rows_total,
            batches_total,
        })
    }

    pub fn message_received(&self, topic: &str) {
        self.messages_total.with_label_values(&[topic]).inc();
    }

    pub fn dedup_skipped(&self, topic: &str) {
        self.dedup_skipped_total.with_label_values(&[topic]).inc();
    }

    pub fn post_success(&self) {
        self.post_success_total.inc();
    }

    pub fn post_fail(&self) {
        self.post_fail_total.inc();
    }

    pub fn dlq_published(&self) {
        self.dlq_total.inc();
    }

    pub fn batch_sent(&self, rows: usize) {
        self.batches_total.inc();
        self.batch_rows_total.inc_by(rows as u64);
    }

    pub fn start_post_timer(&self) -> PostTimer<'_> {
        PostTimer {
            start: Instant::now(),
            histogram: &self.post_latency_seconds,
        }
    }

    #[cfg(test)]
    pub fn post_success_count(&self) -> u64 {
        self.post_success_total.get()
    }

    #[cfg(test)]
    pub fn post_fail_count(&self) -> u64 {
        self.post_fail_total.get()
    }

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        encoder
            .encode(&self.registry.gather(), &mut buf)
            .expect("prometheus text encoding");
        buf
    }
}

/// Observes elapsed time into the latency histogram regardless of the
/// outcome of the call it timed. Latency is recorded on both success
/// and failure paths.
pub struct PostTimer<'a> {
    start: Instant,
    histogram: &'a Histogram,
}

impl PostTimer<'_> {
    pub fn observe(self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

async fn metrics_handler(State(telemetry): State<Arc<Telemetry>>) -> Response {
    let body = telemetry.encode();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
        body,
    )
        .into_response()
}

/// Binds the metrics listener, separately from [`run`] so the caller can
/// treat a bind failure as a startup error before the consumer loop starts.
pub async fn bind(port: u16) -> Result<tokio::net::TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tokio::net::TcpListener::bind(addr).await.map_err(ForwarderError::Io)
}

pub async fn run(listener: tokio::net::TcpListener, telemetry: Arc<Telemetry>) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(telemetry);

    let addr = listener.local_addr().map_err(ForwarderError::Io)?;
    info!("metrics server listening on http://{addr}/metrics");
    axum::serve(listener, app).await.map_err(ForwarderError::Io)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let t = Telemetry::new().unwrap();
        assert_eq!(t.post_success_count(), 0);
        assert_eq!(t.post_fail_count(), 0);
    }

    #[test]
    fn encode_output_contains_registered_families() {
        let t = Telemetry::new().unwrap();
        t.message_received("customer");
        t.post_success();
        let text = String::from_utf8(t.encode()).unwrap();
        assert!(text.contains("consumer_messages_total"));
        assert!(text.contains("analytics_post_success_total 1"));
    }
}
