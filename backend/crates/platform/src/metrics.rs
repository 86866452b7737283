//! HTTP request metrics
//!
//! Counters and a latency histogram on a private prometheus registry,
//! rendered in the text exposition format.

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
#[error("metrics registry error: {0}")]
pub struct MetricsError(#[from] prometheus::Error);

#[derive(Clone)]
pub struct HttpMetrics {
    registry: Registry,
    requests_received: IntCounter,
    responses_sent: IntCounterVec,
    processing_time: Histogram,
    in_flight: IntGauge,
    background_tasks: IntGauge,
}

impl HttpMetrics {
    /// `version` is published as a label on the `build_info` gauge.
    pub fn new(version: &str) -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let requests_received =
            IntCounter::new("http_requests_received_total", "Requests received")?;
        let responses_sent = IntCounterVec::new(
            Opts::new("http_responses_sent_total", "Responses sent, by status code"),
            &["status"],
        )?;
        let processing_time = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "Time from request receipt to response",
        ))?;
        let in_flight = IntGauge::new("http_requests_in_flight", "Requests being processed")?;
        let background_tasks =
            IntGauge::new("background_tasks", "Background tasks still running")?;
        let build_info = IntGauge::with_opts(
            Opts::new("build_info", "Build version").const_label("version", version),
        )?;
        build_info.set(1);

        registry.register(Box::new(requests_received.clone()))?;
        registry.register(Box::new(responses_sent.clone()))?;
        registry.register(Box::new(processing_time.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;
        registry.register(Box::new(background_tasks.clone()))?;
        registry.register(Box::new(build_info))?;

        Ok(Self {
            registry,
            requests_received,
            responses_sent,
            processing_time,
            in_flight,
            background_tasks,
        })
    }

    pub fn request_received(&self) {
        self.requests_received.inc();
        self.in_flight.inc();
    }

    pub fn response_sent(&self, status: u16, elapsed: Duration) {
        self.in_flight.dec();
        self.responses_sent
            .with_label_values(&[status.to_string().as_str()])
            .inc();
        self.processing_time.observe(elapsed.as_secs_f64());
    }

    /// Sampled at scrape time
    pub fn set_background_tasks(&self, count: usize) {
        self.background_tasks
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn render(&self) -> Result<String, MetricsError> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_requests_and_responses() {
        let metrics = HttpMetrics::new("1.0.0").unwrap();

        metrics.request_received();
        metrics.request_received();
        metrics.response_sent(200, Duration::from_millis(3));

        let text = metrics.render().unwrap();
        assert!(text.contains("http_requests_received_total 2"));
        assert!(text.contains("http_responses_sent_total{status=\"200\"} 1"));
        assert!(text.contains("http_requests_in_flight 1"));
        assert!(text.contains("http_request_duration_seconds_count 1"));
        assert!(text.contains("build_info{version=\"1.0.0\"} 1"));
    }

    #[test]
    fn test_background_task_gauge() {
        let metrics = HttpMetrics::new("dev").unwrap();
        metrics.set_background_tasks(3);
        assert!(metrics.render().unwrap().contains("background_tasks 3"));
    }

    #[test]
    fn test_registries_are_independent() {
        let first = HttpMetrics::new("a").unwrap();
        let second = HttpMetrics::new("b").unwrap();
        first.request_received();
        assert!(second.render().unwrap().contains("http_requests_received_total 0"));
    }
}
