use actix_web::{get, web, HttpResponse, Responder};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

const NAMESPACE: &str = "doubles";

/// HTTP request metrics
pub struct HttpMetrics {
    /// Request duration histogram (in seconds)
    pub request_duration: HistogramVec,
    /// Total HTTP requests counter
    pub requests_total: IntCounterVec,
}

/// Background validation processor metrics
pub struct ProcessorMetrics {
    /// Run duration histogram (in seconds), labelled by trigger
    pub run_duration: HistogramVec,
    /// Runs by outcome: success, partial, failed, skipped
    pub runs_total: IntCounterVec,
    /// Matches moved to a terminal status, by status
    pub matches_resolved: IntCounterVec,
    /// 1 while the processor is scheduling runs, 0 when stopped or suspended
    pub active: IntGauge,
}

pub struct ReportMetrics {
    /// Report submissions by outcome (accepted or the refusal reason)
    pub submissions_total: IntCounterVec,
}

/// All application metrics, registered against one registry.
///
/// Each instance owns its registry so tests can build as many as they like.
pub struct Metrics {
    registry: Registry,
    pub http: HttpMetrics,
    pub processor: ProcessorMetrics,
    pub reports: ReportMetrics,
}

impl Metrics {
    /// Initialize all metrics and register them with Prometheus
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // HTTP metrics
        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "HTTP request duration in seconds")
                .namespace(NAMESPACE)
                .subsystem("http"),
            &["method", "status_code"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Total number of HTTP requests")
                .namespace(NAMESPACE)
                .subsystem("http"),
            &["method", "status_code"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        // Processor metrics
        let run_duration = HistogramVec::new(
            HistogramOpts::new("run_duration_seconds", "Validation run duration in seconds")
                .namespace(NAMESPACE)
                .subsystem("processor"),
            &["trigger"],
        )?;
        registry.register(Box::new(run_duration.clone()))?;

        let runs_total = IntCounterVec::new(
            Opts::new("runs_total", "Total number of validation runs")
                .namespace(NAMESPACE)
                .subsystem("processor"),
            &["outcome"],
        )?;
        registry.register(Box::new(runs_total.clone()))?;

        let matches_resolved = IntCounterVec::new(
            Opts::new("matches_resolved_total", "Matches moved to a terminal status")
                .namespace(NAMESPACE)
                .subsystem("processor"),
            &["status"],
        )?;
        registry.register(Box::new(matches_resolved.clone()))?;

        let active = IntGauge::with_opts(
            Opts::new("active", "Processor status (1 = scheduling, 0 = stopped or suspended)")
                .namespace(NAMESPACE)
                .subsystem("processor"),
        )?;
        registry.register(Box::new(active.clone()))?;

        // Report metrics
        let submissions_total = IntCounterVec::new(
            Opts::new("submissions_total", "Match report submissions by outcome")
                .namespace(NAMESPACE)
                .subsystem("reports"),
            &["outcome"],
        )?;
        registry.register(Box::new(submissions_total.clone()))?;

        Ok(Metrics {
            registry,
            http: HttpMetrics {
                request_duration,
                requests_total,
            },
            processor: ProcessorMetrics {
                run_duration,
                runs_total,
                matches_resolved,
                active,
            },
            reports: ReportMetrics { submissions_total },
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of everything registered here.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Helper function to record HTTP request metrics
pub fn record_http_request(metrics: &Metrics, method: &str, status_code: u16, duration: Duration) {
    let status_str = status_code.to_string();

    metrics
        .http
        .request_duration
        .with_label_values(&[method, &status_str])
        .observe(duration.as_secs_f64());

    metrics
        .http
        .requests_total
        .with_label_values(&[method, &status_str])
        .inc();
}

/// Helper function to record one processor run
pub fn record_processor_run(metrics: &Metrics, trigger: &str, outcome: &str, duration: Duration) {
    metrics
        .processor
        .run_duration
        .with_label_values(&[trigger])
        .observe(duration.as_secs_f64());

    metrics
        .processor
        .runs_total
        .with_label_values(&[outcome])
        .inc();
}

pub fn record_match_resolved(metrics: &Metrics, status: &str) {
    metrics
        .processor
        .matches_resolved
        .with_label_values(&[status])
        .inc();
}

pub fn record_report_submission(metrics: &Metrics, outcome: &str) {
    metrics
        .reports
        .submissions_total
        .with_label_values(&[outcome])
        .inc();
}

/// Prometheus scrape endpoint
#[get("/metrics")]
pub async fn metrics_endpoint(metrics: web::Data<Arc<Metrics>>) -> impl Responder {
    match metrics.render() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(body),
        Err(e) => {
            log::error!("Failed to encode metrics: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
