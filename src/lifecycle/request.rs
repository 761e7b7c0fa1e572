//! Request lifecycle engine.
//!
//! # Responsibilities
//! - Resolve the effective request (merged headers, timeout, encoded body)
//! - Open a stream and send the header block and body
//! - Assemble the response from stream events
//! - Race the exchange against the request timeout
//! - Release the stream and emit one observation on every exit path
//!
//! # State Machine
//! ```text
//! Built → HeadersSent → AwaitingResponse → Streaming → Complete
//!    ╰──────────────┴──────────────┴────────────┴──→ Failed | TimedOut
//! ```
//!
//! # Design Decisions
//! - `run` consumes the lifecycle, so it resolves exactly once
//! - The timeout is a deadline raced against the whole exchange; whichever
//!   finishes first wins and the other side is dropped
//! - Body encoding happens before the stream opens so the header block
//!   carries content-type and content-length
//! - Transport errors are returned unchanged; nothing is retried

use std::fmt;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::SessionError;
use crate::http::headers::{
    Headers, PSEUDO_AUTHORITY, PSEUDO_METHOD, PSEUDO_PATH, PSEUDO_SCHEME, PSEUDO_STATUS,
};
use crate::http::request::{encode_body, path_with_query};
use crate::http::{Method, RequestConfig, RequestOptions, Response};
use crate::net::{StreamEvent, StreamHandle};
use crate::observability::metrics::{PeerLabels, RequestOutcome, Telemetry};
use crate::observability::tracing::{lifecycle_span, request_id};
use crate::session::Session;

/// Where a lifecycle is in its exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Built,
    HeadersSent,
    AwaitingResponse,
    Streaming,
    Complete,
    Failed,
    TimedOut,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleState::Complete | LifecycleState::Failed | LifecycleState::TimedOut
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Built => "built",
            LifecycleState::HeadersSent => "headers_sent",
            LifecycleState::AwaitingResponse => "awaiting_response",
            LifecycleState::Streaming => "streaming",
            LifecycleState::Complete => "complete",
            LifecycleState::Failed => "failed",
            LifecycleState::TimedOut => "timed_out",
        };
        f.write_str(name)
    }
}

/// One request, from stream open to response or error.
pub struct RequestLifecycle<'s> {
    session: &'s Session,
    id: Uuid,
    config: RequestConfig,
    body: Option<Bytes>,
    state: LifecycleState,
}

impl<'s> RequestLifecycle<'s> {
    /// Resolve `options` against the session defaults.
    pub fn new(session: &'s Session, method: Method, path: &str, options: RequestOptions) -> Self {
        let mut headers = Headers::merged(session.default_headers(), &options.headers);
        let body = encode_body(options.body, &mut headers);
        let timeout = options.timeout.unwrap_or_else(|| session.default_timeout());

        Self {
            session,
            id: request_id(),
            config: RequestConfig {
                method,
                path: path_with_query(path, &options.query),
                headers,
                timeout,
            },
            body,
            state: LifecycleState::Built,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.state
    }

    /// Drive the exchange to its single terminal state.
    pub async fn run(self) -> Result<Response, SessionError> {
        let span = lifecycle_span(&self.id, self.config.method, &self.config.path);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> Result<Response, SessionError> {
        let session = self.session;
        let mut observation = Observation::start(
            session.telemetry(),
            session.peer(),
            self.config.method,
            route(&self.config.path).to_string(),
        );
        tracing::debug!(timeout_ms = self.config.timeout.as_millis() as u64, "Request started");

        let mut stream: Option<Box<dyn StreamHandle>> = None;
        let outcome = tokio::time::timeout(self.config.timeout, self.drive(&mut stream)).await;

        if let Some(mut stream) = stream.take() {
            stream.close();
        }

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                self.transition(LifecycleState::TimedOut);
                tracing::warn!(
                    origin = %session.origin(),
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Request timed out"
                );
                Err(SessionError::Timeout {
                    origin: session.origin().to_string(),
                    method: self.config.method,
                    path: self.config.path.clone(),
                    timeout: self.config.timeout,
                })
            }
        };

        let finished = match &result {
            Ok(response) => RequestOutcome::Status(response.status()),
            Err(e) => RequestOutcome::Error(e.kind()),
        };
        let elapsed = observation.finish(finished);
        tracing::debug!(
            state = %self.state(),
            outcome = %finished,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request finished"
        );

        result
    }

    /// Open the stream, send the request and collect the response.
    async fn drive(
        &mut self,
        slot: &mut Option<Box<dyn StreamHandle>>,
    ) -> Result<Response, SessionError> {
        let opened = self.session.connection().open_stream(self.header_block()).await;
        let stream = match opened {
            Ok(stream) => slot.insert(stream),
            Err(e) => return Err(self.fail(e)),
        };
        self.transition(LifecycleState::HeadersSent);

        if let Err(e) = stream.end(self.body.take()).await {
            return Err(self.fail(e));
        }
        self.transition(LifecycleState::AwaitingResponse);

        let mut context = RequestContext::new();
        loop {
            match stream.next_event().await {
                StreamEvent::Response(headers) => {
                    tracing::trace!(
                        status = ?headers.get_str(PSEUDO_STATUS),
                        "Response headers received"
                    );
                    context.headers = headers;
                    self.transition(LifecycleState::Streaming);
                }
                StreamEvent::Data(chunk) => context.body.extend_from_slice(&chunk),
                StreamEvent::End => {
                    self.transition(LifecycleState::Complete);
                    return Ok(context.into_response(self.config.clone()));
                }
                StreamEvent::Error(e) => {
                    return Err(self.fail(e));
                }
            }
        }
    }

    /// Pseudo-fields followed by the merged ordinary headers.
    fn header_block(&self) -> Headers {
        let origin = self.session.origin();
        let mut head = Headers::new();
        head.insert(PSEUDO_METHOD, self.config.method.as_str());
        head.insert(PSEUDO_PATH, self.config.path.as_str());
        head.insert(PSEUDO_SCHEME, origin.scheme().as_str());
        head.insert(PSEUDO_AUTHORITY, origin.authority());
        for (name, value) in self.config.headers.regular() {
            head.insert(name, value.clone());
        }
        head
    }

    fn fail(&mut self, error: crate::net::TransportError) -> SessionError {
        self.transition(LifecycleState::Failed);
        tracing::warn!(origin = %self.session.origin(), error = %error, "Request failed");
        SessionError::Transport(error)
    }

    fn transition(&mut self, next: LifecycleState) {
        if self.state.is_terminal() {
            return;
        }
        tracing::trace!(from = %self.state, to = %next, "Lifecycle transition");
        self.state = next;
    }
}

/// Response being assembled from stream events.
struct RequestContext {
    headers: Headers,
    body: BytesMut,
}

impl RequestContext {
    fn new() -> Self {
        Self {
            headers: Headers::new(),
            body: BytesMut::new(),
        }
    }

    fn into_response(self, request: RequestConfig) -> Response {
        Response::from_parts(self.headers, self.body.freeze(), request)
    }
}

/// Route label: the path without its query.
fn route(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

/// Emits `request_started` on creation and exactly one `request_finished`,
/// recording `cancelled` when the run is dropped before finishing.
struct Observation<'a> {
    telemetry: &'a dyn Telemetry,
    peer: &'a PeerLabels,
    method: Method,
    route: String,
    started: Instant,
    finished: bool,
}

impl<'a> Observation<'a> {
    fn start(telemetry: &'a dyn Telemetry, peer: &'a PeerLabels, method: Method, route: String) -> Self {
        telemetry.request_started(peer);
        Self {
            telemetry,
            peer,
            method,
            route,
            started: Instant::now(),
            finished: false,
        }
    }

    fn finish(&mut self, outcome: RequestOutcome) -> Duration {
        let elapsed = self.started.elapsed();
        if !self.finished {
            self.finished = true;
            self.telemetry
                .request_finished(self.peer, self.method, &self.route, &outcome, elapsed);
        }
        elapsed
    }
}

impl Drop for Observation<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.finish(RequestOutcome::Error("cancelled"));
        }
    }
}
