use actix_web::{web, App, HttpServer};
use backend::config::Config;
use backend::metrics::Metrics;
use backend::ratings::{Glicko2Params, RatingEngine};
use backend::validation::memory::{InMemoryMatchStore, InMemoryRatingStore, InMemoryReportStore};
use backend::validation::{
    BackgroundValidationProcessor, MatchReportingService, MatchStore, RatingStore, ReportStore,
    SystemClock, ValidationEvents,
};
use log::{error, info};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    let metrics = match Metrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            error!("Failed to register metrics: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    let matches: Arc<dyn MatchStore> = Arc::new(InMemoryMatchStore::new());
    let reports: Arc<dyn ReportStore> = Arc::new(InMemoryReportStore::new());
    let ratings: Arc<dyn RatingStore> = Arc::new(InMemoryRatingStore::new());
    let clock = Arc::new(SystemClock);
    let events = ValidationEvents::default();

    let engine = RatingEngine::new(Glicko2Params {
        tau: config.rating.tau,
        ..Glicko2Params::default()
    });

    let reporting = web::Data::new(
        MatchReportingService::new(
            matches.clone(),
            reports.clone(),
            clock.clone(),
            config.validation.clone(),
        )
        .with_events(events.clone())
        .with_metrics(metrics.clone()),
    );

    let processor = BackgroundValidationProcessor::new(
        matches.clone(),
        reports,
        ratings,
        clock,
        engine,
        config.validation.clone(),
    )
    .with_events(events)
    .with_metrics(metrics.clone());

    if let Err(e) = processor.start().await {
        error!("Failed to start validation processor: {}", e);
    } else {
        info!("Validation processor started");
    }

    let processor_data = web::Data::new(processor.clone());
    let matches_data = web::Data::new(matches);
    let metrics_data = web::Data::new(metrics);

    info!("Starting server on {}:{}", config.server.host, config.server.port);

    let result = HttpServer::new(move || {
        App::new()
            .wrap(backend::middleware::PlayerIdentity)
            .wrap(backend::middleware::Logger)
            .app_data(web::JsonConfig::default().limit(16 * 1024))
            .app_data(matches_data.clone())
            .app_data(processor_data.clone())
            .app_data(reporting.clone())
            .app_data(metrics_data.clone())
            .service(backend::health::health_check)
            .service(backend::health::detailed_health_check)
            .service(backend::metrics::metrics_endpoint)
            .configure(backend::validation::controller::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await;

    processor.stop().await;
    result
}
