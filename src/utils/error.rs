//! The `error` module defines the error types used within the `infocenter` application.
//!
//! Broker operations are infallible; everything here happens at the edges,
//! either while starting up or while handling an HTTP request.

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    BodyRead(#[from] BytesRejection),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BodyRead(_) => StatusCode::BAD_REQUEST,
            Error::Config(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Error::BodyRead(_) => {
                warn!("{self}");
                "Failed to read request body"
            }
            _ => {
                error!("{self}");
                "Internal server error"
            }
        };
        (status, body).into_response()
    }
}
