use actix_web::{web, HttpResponse};
use log::info;
use shared::{ReportOutcome, SubmitReportRequest};

use super::processor::BackgroundValidationProcessor;
use super::reporting::MatchReportingService;
use crate::error::ApiError;
use crate::middleware::PlayerId;

type Caller = Option<web::ReqData<PlayerId>>;

fn caller_id(caller: &Caller) -> Option<String> {
    caller.as_ref().map(|p| p.0.clone())
}

/// Registers the match validation and processor routes.
///
/// Expects `web::Data<MatchReportingService>` and
/// `web::Data<BackgroundValidationProcessor>` in app data.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/matches/{id}")
            .route("/validation", web::get().to(get_validation))
            .route("/eligibility", web::get().to(get_eligibility))
            .route("/reports", web::get().to(list_reports))
            .route("/reports", web::post().to(submit_report)),
    )
    .service(
        web::scope("/api/validation/processor")
            .route("", web::get().to(processor_status))
            .route("/run", web::post().to(run_processor))
            .route("/resume", web::post().to(resume_processor)),
    );
}

async fn get_validation(
    path: web::Path<String>,
    caller: Caller,
    service: web::Data<MatchReportingService>,
) -> Result<HttpResponse, ApiError> {
    let user = caller_id(&caller);
    let snapshot = service.refresh(&path, user.as_deref()).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

async fn get_eligibility(
    path: web::Path<String>,
    caller: Caller,
    service: web::Data<MatchReportingService>,
) -> Result<HttpResponse, ApiError> {
    let user = caller_id(&caller);
    let eligibility = service.can_user_report_match(&path, user.as_deref()).await?;
    Ok(HttpResponse::Ok().json(eligibility))
}

async fn list_reports(
    path: web::Path<String>,
    service: web::Data<MatchReportingService>,
) -> Result<HttpResponse, ApiError> {
    let reports = service.list_reports(&path).await?;
    Ok(HttpResponse::Ok().json(reports))
}

async fn submit_report(
    path: web::Path<String>,
    caller: Caller,
    body: web::Json<SubmitReportRequest>,
    service: web::Data<MatchReportingService>,
) -> Result<HttpResponse, ApiError> {
    let user = caller_id(&caller);
    let outcome = service
        .submit_report(&path, user.as_deref(), body.into_inner())
        .await?;

    Ok(match outcome {
        accepted @ ReportOutcome::Accepted { .. } => HttpResponse::Created().json(accepted),
        refused @ ReportOutcome::Refused { .. } => HttpResponse::Conflict().json(refused),
    })
}

async fn processor_status(
    processor: web::Data<BackgroundValidationProcessor>,
) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(processor.status().await))
}

async fn run_processor(
    processor: web::Data<BackgroundValidationProcessor>,
) -> Result<HttpResponse, ApiError> {
    info!("Manual validation run requested");
    match processor.process_now().await {
        Some(summary) => Ok(HttpResponse::Ok().json(summary)),
        None => Ok(HttpResponse::Accepted().json(serde_json::json!({
            "message": "A validation run is already in progress"
        }))),
    }
}

async fn resume_processor(
    processor: web::Data<BackgroundValidationProcessor>,
) -> Result<HttpResponse, ApiError> {
    processor.resume().await;
    Ok(HttpResponse::Ok().json(processor.status().await))
}
