//! HTTP transport
//!
//! This file exposes the broker over HTTP:
//! - `GET /infocenter/{topic}` opens an event stream served by a `Session`
//! - `POST /infocenter/{topic}` publishes the raw request body
//! - `OPTIONS /infocenter/{topic}` answers CORS preflight requests
//!
//! Every stream runs its session on its own task. Frames travel to the
//! response body through a small bounded channel; when the client goes away
//! the body is dropped, which the session sees as a disconnect.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::broker::{Broker, MessageId};
use crate::stream::{Frame, Session, SessionConfig};
use crate::transport::layers::{self, Cors};
use crate::utils::Result;

/// Request header carrying the client's resume marker.
pub const LAST_EVENT_ID: &str = "last-event-id";

/// Frames a session may queue ahead of the network.
const FRAME_BUFFER: usize = 16;

#[derive(Debug, Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
    pub session: SessionConfig,
}

impl AppState {
    pub fn new(broker: Arc<Broker>, session: SessionConfig) -> Self {
        Self { broker, session }
    }
}

pub fn router(state: AppState, cors: Cors) -> Router {
    Router::new()
        .route(
            "/infocenter/{topic}",
            get(receive_messages).post(send_message).options(preflight),
        )
        .layer(from_fn_with_state(cors, layers::apply_cors))
        .layer(from_fn(layers::log_requests))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then close every open stream and wait
/// for in-flight requests to finish.
pub async fn serve<F>(listener: TcpListener, state: AppState, cors: Cors, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("Infocenter listening on http://{addr}");

    let broker = Arc::clone(&state.broker);
    let app = router(state, cors);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            let closed = broker.close_all_subscribers();
            info!(closed, "closing open streams");
        })
        .await?;

    Ok(())
}

/// Parse the resume marker. Missing or malformed values mean "no marker".
pub fn parse_last_event_id(headers: &HeaderMap) -> Option<MessageId> {
    headers
        .get(LAST_EVENT_ID)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

pub async fn receive_messages(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    headers: HeaderMap,
) -> Response {
    let resume_from = parse_last_event_id(&headers);
    let session = Session::open(Arc::clone(&state.broker), &topic, resume_from, state.session);
    let (sink, frames) = mpsc::channel::<Frame>(FRAME_BUFFER);

    debug!(topic = %topic, ?resume_from, "stream opened");
    tokio::spawn(session.run(sink));

    let body = Body::from_stream(
        ReceiverStream::new(frames).map(|frame| Ok::<Bytes, Infallible>(frame.encode())),
    );

    (
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<StatusCode> {
    let body = body?;
    let content = String::from_utf8_lossy(&body).into_owned();
    let message = state.broker.add_message(&topic, content);
    debug!(topic = %topic, message_id = message.id, "message published");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn preflight() -> StatusCode {
    StatusCode::OK
}
