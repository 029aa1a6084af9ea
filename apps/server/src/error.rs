use std::io::Error as IoError;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use history::HistoryError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error("Address parsing error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
    #[error("History database error: {0}")]
    History(#[from] HistoryError),
}

/// Errors returned by the API handlers, rendered as JSON
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("history unavailable: {0}")]
    History(#[from] HistoryError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::History(HistoryError::Pool(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        tracing::error!(error = %self, "API request failed");
        HttpResponse::build(self.status_code()).json(ErrorBody { error: self.to_string() })
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}
