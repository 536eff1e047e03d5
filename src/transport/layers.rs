//! Middleware applied to every route: request logging and CORS headers.

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
};
use axum::middleware::Next;
use axum::response::Response;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::ServerSettings;

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Accept, Content-Type, Last-Event-ID";
const EXPOSED_HEADERS: &str = "Link";

/// CORS values resolved once at startup.
#[derive(Debug, Clone)]
pub struct Cors {
    allowed_origin: HeaderValue,
    max_age: HeaderValue,
}

impl Default for Cors {
    fn default() -> Self {
        Self {
            allowed_origin: HeaderValue::from_static("*"),
            max_age: HeaderValue::from(300u64),
        }
    }
}

impl Cors {
    pub fn from_settings(server: &ServerSettings) -> Self {
        let allowed_origin = match HeaderValue::from_str(&server.cors_allowed_origin) {
            Ok(value) => value,
            Err(_) => {
                warn!(
                    origin = %server.cors_allowed_origin,
                    "invalid CORS origin, allowing any origin"
                );
                HeaderValue::from_static("*")
            }
        };
        Self {
            allowed_origin,
            max_age: HeaderValue::from(server.cors_max_age_secs),
        }
    }
}

pub async fn apply_cors(State(cors): State<Cors>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, cors.allowed_origin);
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
    headers.insert(ACCESS_CONTROL_MAX_AGE, cors.max_age);
    response
}

/// Log method, path, status and time to response headers.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}
