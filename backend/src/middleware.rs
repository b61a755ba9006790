use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::HttpMessage;
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    web, Error,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use log::{error, info, warn};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use uuid::Uuid;

use crate::metrics::{record_http_request, Metrics};

/// Header the upstream authentication layer sets to the signed-in player.
pub const PLAYER_ID_HEADER: &str = "x-player-id";

// Global counter for fast test ID generation
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a request ID - counter-based under test, UUID v4 otherwise
fn generate_request_id() -> String {
    if cfg!(test) {
        let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("test-{}", counter)
    } else {
        Uuid::new_v4().to_string()
    }
}

pub struct Logger;

impl<S, B> Transform<S, ServiceRequest> for Logger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let start_time = Instant::now();
        let method = req.method().clone();
        let uri = req.uri().clone();
        let peer_addr = req.peer_addr().map(|addr| addr.to_string());
        let metrics = req.app_data::<web::Data<Arc<Metrics>>>().map(|m| m.get_ref().clone());

        let correlation_id = generate_request_id();
        req.extensions_mut().insert(correlation_id.clone());

        Box::pin(async move {
            let mut res = svc.call(req).await?;
            let duration = start_time.elapsed();

            if let Ok(header_value) = HeaderValue::try_from(correlation_id.as_str()) {
                res.headers_mut().insert(
                    HeaderName::from_static("x-request-id"),
                    header_value,
                );
            }

            let status_code = res.status().as_u16();
            if let Some(metrics) = metrics {
                record_http_request(&metrics, method.as_str(), status_code, duration);
            }

            let peer = peer_addr.unwrap_or_else(|| "unknown".to_string());
            if status_code >= 500 {
                error!(
                    "request_id={} {} {} {} {}ms {}",
                    correlation_id, method, uri, status_code, duration.as_millis(), peer
                );
            } else if status_code >= 400 {
                warn!(
                    "request_id={} {} {} {} {}ms {}",
                    correlation_id, method, uri, status_code, duration.as_millis(), peer
                );
            } else {
                info!(
                    "request_id={} {} {} {} {}ms {}",
                    correlation_id, method, uri, status_code, duration.as_millis(), peer
                );
            }

            Ok(res)
        })
    }
}

/// Identity of the calling player, as vouched for by the upstream auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerId(pub String);

/// Copies `x-player-id` into request extensions as a [`PlayerId`].
///
/// A missing or blank header leaves the request anonymous; handlers decide
/// what anonymous callers may do.
pub struct PlayerIdentity;

impl<S, B> Transform<S, ServiceRequest> for PlayerIdentity
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = PlayerIdentityMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(PlayerIdentityMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct PlayerIdentityMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for PlayerIdentityMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let player = req
            .headers()
            .get(PLAYER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| PlayerId(id.to_string()));

        if let Some(player) = player {
            req.extensions_mut().insert(player);
        }

        let svc = self.service.clone();
        Box::pin(async move { svc.call(req).await })
    }
}
