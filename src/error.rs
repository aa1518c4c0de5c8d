use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::time::Duration;
use thiserror::Error as ThisError;

use crate::core::models::application::{ApplicationKind, ApplicationStatus};

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("a live {kind} application already exists (existing id: {existing:?})")]
    Conflict { kind: ApplicationKind, existing: Option<i32> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("application {id} is already {status}")]
    InvalidState { id: i32, status: ApplicationStatus },

    #[error("user {user_id} is already a member of club {club_id}")]
    AlreadyMember { user_id: i32, club_id: i32 },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("proposal codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("transaction timed out after {0:?}")]
    Timeout(Duration),

    #[error("transaction aborted: {0}")]
    Aborted(String),
}

impl Error {
    pub fn not_found(what: &str, id: i32) -> Self {
        Error::NotFound(format!("{}(id: {})", what, id))
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Conflict { .. } | Error::InvalidState { .. } | Error::AlreadyMember { .. } => StatusCode::CONFLICT,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Database(_) | Error::Storage(_) | Error::Codec(_) | Error::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // server-side details stay in the log
        let message = if status.is_server_error() { "internal error".to_owned() } else { self.to_string() };
        let mut body = json!({ "error": message });
        if let Error::Conflict { existing: Some(id), .. } = self {
            body["existing_id"] = json!(id);
        }
        HttpResponse::build(status).json(body)
    }
}
