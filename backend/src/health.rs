use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::validation::processor::BackgroundValidationProcessor;
use crate::validation::repository::MatchStore;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: &'static str,
}

#[get("/health")]
pub async fn health_check() -> impl Responder {
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().timestamp(),
        version: env!("CARGO_PKG_VERSION"),
    };

    HttpResponse::Ok().json(response)
}

#[derive(Serialize)]
struct ServiceHealthStatus {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_time_ms: Option<u64>,
}

impl ServiceHealthStatus {
    fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            message: None,
            response_time_ms: None,
        }
    }

    fn unhealthy(message: String) -> Self {
        Self {
            status: "unhealthy".to_string(),
            message: Some(message),
            response_time_ms: None,
        }
    }

    fn with_response_time(mut self, ms: u64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }

    fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Check the match store answers a point lookup
async fn check_match_store(store: &dyn MatchStore) -> ServiceHealthStatus {
    let start = std::time::Instant::now();

    match timeout(Duration::from_secs(5), store.get_match("__health__")).await {
        Ok(Ok(_)) => {
            let elapsed = start.elapsed().as_millis() as u64;
            ServiceHealthStatus::healthy().with_response_time(elapsed)
        }
        Ok(Err(e)) => ServiceHealthStatus::unhealthy(format!("Match store query failed: {}", e)),
        Err(_) => ServiceHealthStatus::unhealthy("Match store timeout".to_string()),
    }
}

/// Check the processor is scheduling and not failing repeatedly
async fn check_processor(processor: &BackgroundValidationProcessor) -> ServiceHealthStatus {
    let status = processor.status().await;

    if !status.is_healthy {
        ServiceHealthStatus::unhealthy(format!(
            "Processor suspended after {} consecutive failed runs",
            status.consecutive_failures
        ))
    } else if !status.is_active {
        ServiceHealthStatus::unhealthy("Processor is not running".to_string())
    } else {
        ServiceHealthStatus::healthy()
    }
}

#[get("/health/detailed")]
pub async fn detailed_health_check(
    matches: web::Data<Arc<dyn MatchStore>>,
    processor: web::Data<BackgroundValidationProcessor>,
) -> impl Responder {
    #[derive(Serialize)]
    struct DetailedHealthResponse {
        status: String,
        timestamp: i64,
        version: &'static str,
        services: ServicesHealth,
    }

    #[derive(Serialize)]
    struct ServicesHealth {
        match_store: ServiceHealthStatus,
        processor: ServiceHealthStatus,
    }

    let (store_status, processor_status) = tokio::join!(
        check_match_store(matches.get_ref().as_ref()),
        check_processor(processor.get_ref())
    );

    let overall_status = if store_status.is_healthy() && processor_status.is_healthy() {
        "ok"
    } else {
        "degraded"
    };

    let response = DetailedHealthResponse {
        status: overall_status.to_string(),
        timestamp: Utc::now().timestamp(),
        version: env!("CARGO_PKG_VERSION"),
        services: ServicesHealth {
            match_store: store_status,
            processor: processor_status,
        },
    };

    if overall_status == "ok" {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
