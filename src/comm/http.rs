//! HTTP transport: action requests by `POST /`, events by polling.
//!
//! Events are collected by a background task into an in-memory buffer that
//! the builtin `get_latest_events` action drains. The buffer is unbounded
//! between polls.

use crate::action::{actions, retcode, Action, Request, Response};
use crate::error::{OneBotError, Result};
use crate::event::{EncodedEvent, EventSubscription};
use crate::onebot::OneBot;
use crate::types::Encoding;
use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response as HttpResponse};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Body of the `GET /` liveness check.
pub const LIVENESS_BODY: &str = "OneBot is running";

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// State shared by one HTTP server's handlers and its event collector.
pub struct HttpComm {
    ob: Arc<OneBot>,
    latest_events: Mutex<Vec<Arc<EncodedEvent>>>,
}

impl HttpComm {
    pub fn new(ob: Arc<OneBot>) -> Arc<Self> {
        Arc::new(Self {
            ob,
            latest_events: Mutex::new(Vec::new()),
        })
    }

    /// Router serving `GET /` and `POST /`. Other methods get 405.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .route("/", get(handle_get).post(handle_post))
            .with_state(Arc::clone(self))
    }

    /// Start filling the polling buffer.
    ///
    /// The subscription is opened before this returns, so every event pushed
    /// afterwards is collected.
    pub fn spawn_collector(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let sub = self.ob.open_listen_chan();
        let comm = Arc::clone(self);
        tokio::spawn(async move { comm.collect(sub, cancel).await })
    }

    async fn collect(&self, mut sub: EventSubscription, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = sub.recv() => match event {
                    Some(event) => {
                        self.latest_events.lock().push(event);
                    }
                    None => {
                        warn!(subscription = %sub.id(), "event subscription dropped, reopening");
                        sub = self.ob.open_listen_chan();
                    }
                },
            }
        }
        self.ob.close_listen_chan(sub.id());
        debug!("HTTP event collector stopped");
    }

    /// Take every buffered event, leaving the buffer empty.
    pub fn get_latest_events(&self) -> Vec<Value> {
        let events = std::mem::take(&mut *self.latest_events.lock());
        events.iter().map(|e| e.value.clone()).collect()
    }

    fn handle_request(&self, request: &Request) -> Response {
        if request.action == Action::core(actions::GET_LATEST_EVENTS) {
            if let Some(rejected) = self.ob.reject_foreign_self(request) {
                return rejected;
            }
            return Response::ok(Some(Value::Array(self.get_latest_events())))
                .with_echo(request.echo.clone());
        }
        self.ob.handle_request(request)
    }
}

async fn handle_get() -> &'static str {
    LIVENESS_BODY
}

async fn handle_post(State(comm): State<Arc<HttpComm>>, req: axum::extract::Request) -> HttpResponse {
    let Some(encoding) = request_encoding(req.headers()) else {
        debug!("unsupported content type");
        return StatusCode::UNSUPPORTED_MEDIA_TYPE.into_response();
    };

    let bytes = match body::to_bytes(req.into_body(), MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "failed to read request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let request = match comm.ob.decode_request(&bytes, encoding) {
        Ok(request) => request,
        Err(OneBotError::Validation(reason)) => {
            debug!(%reason, "invalid action request");
            let response = Response::failed(retcode::BAD_REQUEST, reason);
            return encoded(StatusCode::BAD_REQUEST, &response, encoding);
        }
        Err(e) => {
            debug!(error = %e, "malformed action request");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let response = comm.handle_request(&request);
    encoded(StatusCode::OK, &response, encoding)
}

fn request_encoding(headers: &HeaderMap) -> Option<Encoding> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(Encoding::from_content_type)
}

fn encoded(status: StatusCode, response: &Response, encoding: Encoding) -> HttpResponse {
    match response.encode(encoding) {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, encoding.content_type())],
            Body::from(bytes),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "failed to encode response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve HTTP on an already bound listener until `cancel` fires.
pub async fn serve_http(listener: TcpListener, ob: Arc<OneBot>, cancel: CancellationToken) -> Result<()> {
    let addr = listener.local_addr()?;
    let comm = HttpComm::new(ob);
    let collector = comm.spawn_collector(cancel.clone());
    let router = comm.router();

    info!(%addr, "HTTP transport listening");

    let shutdown = cancel.clone();
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    // the collector must not outlive the server
    cancel.cancel();
    if let Err(e) = collector.await {
        warn!(error = %e, "HTTP event collector panicked");
    }
    info!(%addr, "HTTP transport stopped");

    served.map_err(|e| OneBotError::Serve(format!("HTTP server on {addr}: {e}")))
}
