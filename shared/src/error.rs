use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error, Clone, PartialEq, Serialize, Deserialize)]
pub enum SharedError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Player {reporter_id} has already reported match {match_id}")]
    DuplicateReport {
        match_id: String,
        reporter_id: String,
    },

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl SharedError {
    /// Errors worth retrying: the store was unreachable or timed out.
    pub fn is_transient(&self) -> bool {
        matches!(self, SharedError::Database(_) | SharedError::Unavailable(_))
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl actix_web::ResponseError for SharedError {
    fn error_response(&self) -> actix_web::HttpResponse {
        match self {
            SharedError::Validation(_) => actix_web::HttpResponse::BadRequest().json(self),
            SharedError::NotFound(_) => actix_web::HttpResponse::NotFound().json(self),
            SharedError::Unauthorized(_) => actix_web::HttpResponse::Unauthorized().json(self),
            SharedError::Conflict(_) => actix_web::HttpResponse::Conflict().json(self),
            SharedError::DuplicateReport { .. } => actix_web::HttpResponse::Conflict().json(self),
            SharedError::Database(_) => actix_web::HttpResponse::InternalServerError().json(self),
            SharedError::Unavailable(_) => actix_web::HttpResponse::ServiceUnavailable().json(self),
            SharedError::Conversion(_) => actix_web::HttpResponse::BadRequest().json(self),
            SharedError::Internal(_) => actix_web::HttpResponse::InternalServerError().json(self),
        }
    }
}

impl From<ValidationErrors> for SharedError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<JsonError> for SharedError {
    fn from(error: JsonError) -> Self {
        Self::Conversion(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SharedError>;
