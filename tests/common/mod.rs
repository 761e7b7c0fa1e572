//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{any, get};
use axum::Router;
use tokio::net::TcpListener;

use h2_session::net::{Script, ScriptedTransport, SentRequest};
use h2_session::observability::{PeerLabels, RequestOutcome, Telemetry};
use h2_session::{Method, Session, SessionOptions};

pub const SCRIPTED_ORIGIN: &str = "http://scripted.test:8080";

/// An observation captured by [`RecordingTelemetry`].
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    RequestStarted,
    RequestFinished {
        method: Method,
        route: String,
        outcome: RequestOutcome,
    },
    SessionOpened,
    SessionClosed {
        requests: i64,
    },
}

/// Telemetry sink that records every observation in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    events: Arc<Mutex<Vec<Observed>>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().unwrap().clone()
    }

    pub fn finished(&self) -> Vec<Observed> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Observed::RequestFinished { .. }))
            .collect()
    }

    pub fn count(&self, wanted: fn(&Observed) -> bool) -> usize {
        self.events().iter().filter(|e| wanted(e)).count()
    }

    fn push(&self, event: Observed) {
        self.events.lock().unwrap().push(event);
    }
}

impl Telemetry for RecordingTelemetry {
    fn request_started(&self, _peer: &PeerLabels) {
        self.push(Observed::RequestStarted);
    }

    fn request_finished(
        &self,
        _peer: &PeerLabels,
        method: Method,
        route: &str,
        outcome: &RequestOutcome,
        _elapsed: Duration,
    ) {
        self.push(Observed::RequestFinished {
            method,
            route: route.to_string(),
            outcome: *outcome,
        });
    }

    fn session_opened(&self, _peer: &PeerLabels) {
        self.push(Observed::SessionOpened);
    }

    fn session_closed(&self, _peer: &PeerLabels, _lifetime: Duration, requests: i64) {
        self.push(Observed::SessionClosed { requests });
    }
}

/// Scripted peer with a handful of routes:
/// - `/delay/{ms}`: 200 with an empty body after `ms` milliseconds
/// - `/echo`: 200, body is the request body, `x-custom` echoed back
/// - `/status/{code}`: that status, empty body
/// - `/error`: headers, one chunk, then a stream reset
/// - anything else: 200 `ok`
pub fn scripted_backend() -> ScriptedTransport {
    ScriptedTransport::new(respond)
}

fn respond(request: &SentRequest) -> Script {
    let path = request.path().unwrap_or("/");
    let path = path.split('?').next().unwrap_or(path);

    if let Some(ms) = path.strip_prefix("/delay/") {
        let ms = ms.parse().unwrap_or(0);
        return Script::new()
            .delay(Duration::from_millis(ms))
            .status(200)
            .end();
    }
    if let Some(code) = path.strip_prefix("/status/") {
        return Script::reply(code.parse().unwrap_or(500), "");
    }
    match path {
        "/echo" => {
            let mut headers = h2_session::Headers::new();
            headers.insert(":status", "200");
            if let Some(custom) = request.header("x-custom") {
                headers.insert("x-custom", custom);
            }
            if let Some(content_type) = request.header("content-type") {
                headers.insert("content-type", content_type);
            }
            let script = Script::new().headers(headers);
            match &request.body {
                Some(body) => script.data(body.clone()).end(),
                None => script.end(),
            }
        }
        "/error" => Script::new()
            .status(200)
            .data("partial")
            .error("stream reset by peer"),
        _ => Script::reply(200, "ok"),
    }
}

/// Open a session on `transport`, recording telemetry into `telemetry`.
pub async fn scripted_session(
    transport: &ScriptedTransport,
    telemetry: &RecordingTelemetry,
    options: SessionOptions,
) -> Session {
    Session::builder(SCRIPTED_ORIGIN)
        .options(options)
        .transport(transport.clone())
        .telemetry(telemetry.clone())
        .connect()
        .await
        .expect("scripted session")
}

/// Start an h2c backend on an ephemeral port.
///
/// Routes mirror [`scripted_backend`] where they overlap.
pub async fn start_h2c_backend() -> SocketAddr {
    let app = Router::new()
        .route("/", get(|| async { "hello from backend" }))
        .route("/echo", any(echo))
        .route(
            "/delay/{ms}",
            get(|Path(ms): Path<u64>| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                StatusCode::OK
            }),
        )
        .route(
            "/status/{code}",
            get(|Path(code): Path<u16>| async move {
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }),
        )
        .route(
            "/tags",
            get(|headers: HeaderMap| async move {
                headers
                    .get_all("x-tag")
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .collect::<Vec<_>>()
                    .join(",")
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(headers: HeaderMap, body: Bytes) -> (HeaderMap, Bytes) {
    let mut reply = HeaderMap::new();
    for name in ["x-custom", "content-type"] {
        if let Some(value) = headers.get(name) {
            reply.insert(name, value.clone());
        }
    }
    (reply, body)
}
