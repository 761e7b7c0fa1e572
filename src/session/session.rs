//! Client sessions.
//!
//! # Responsibilities
//! - Validate the origin, protocol tag and options before connecting
//! - Own the connection and share it with every lifecycle it starts
//! - Watch the connection for its terminal event
//! - Expose the verb methods, optionally through a concurrency gate
//! - Count requests and report session lifetime once
//!
//! # Design Decisions
//! - Connectivity is an atomic flag flipped with `swap`, so terminal cleanup
//!   runs once whether triggered by `close()`, `Drop` or the connection
//! - Every finished request counts, successful or not
//! - Only the session closes the connection

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::validation::validate_options;
use crate::config::SessionOptions;
use crate::error::SessionError;
use crate::http::{Headers, Method, RequestOptions, Response};
use crate::lifecycle::{ConcurrencyGate, Counter, RequestLifecycle};
use crate::net::{ConnectTarget, Connection, H2Transport, Transport, TransportError};
use crate::observability::metrics::{MetricsTelemetry, PeerLabels, Telemetry};
use crate::session::{Origin, Protocol};

/// Builder for a [`Session`] with a custom transport or telemetry sink.
pub struct SessionBuilder {
    origin: String,
    options: SessionOptions,
    transport: Arc<dyn Transport>,
    telemetry: Arc<dyn Telemetry>,
}

impl SessionBuilder {
    pub fn options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    pub fn telemetry(mut self, telemetry: impl Telemetry + 'static) -> Self {
        self.telemetry = Arc::new(telemetry);
        self
    }

    /// Connect, run `f` with the session, and close it however `f` ends.
    pub async fn scope<F, Fut, T, E>(self, f: F) -> Result<T, E>
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<SessionError>,
    {
        let session = Arc::new(self.connect().await?);
        let _closer = CloseOnExit(session.clone());
        f(session).await
    }

    /// Validate everything, then open the connection.
    pub async fn connect(self) -> Result<Session, SessionError> {
        let origin = Origin::parse(&self.origin)?;
        let protocol = self
            .options
            .protocol
            .unwrap_or_else(|| Protocol::for_scheme(origin.scheme()))
            .validate(origin.scheme())?;

        validate_options(&self.options).map_err(|errors| {
            SessionError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;
        let gate = self.options.concurrency.map(ConcurrencyGate::new).transpose()?;

        let target = ConnectTarget {
            origin: origin.clone(),
            tls: self.options.tls_options(),
            connect_timeout: self.options.connect_timeout(),
            keep_alive_interval: self.options.keep_alive_interval(),
            keep_alive_timeout: self.options.keep_alive_timeout(),
        };
        let connection: Arc<dyn Connection> =
            match tokio::time::timeout(target.connect_timeout, self.transport.connect(&target)).await {
                Ok(Ok(connection)) => Arc::from(connection),
                Ok(Err(e)) => {
                    tracing::warn!(origin = %origin, error = %e, "Connect failed");
                    return Err(e.into());
                }
                Err(_) => {
                    tracing::warn!(origin = %origin, "Connect timed out");
                    return Err(TransportError::ConnectTimeout(target.connect_timeout).into());
                }
            };

        let peer = PeerLabels::new(protocol, &origin);
        let state = Arc::new(SessionState {
            alive: AtomicBool::new(true),
            requests: Counter::new(),
            started: Instant::now(),
            opened_at: SystemTime::now(),
            closed_at: Mutex::new(None),
            peer,
            telemetry: self.telemetry.clone(),
        });
        state.telemetry.session_opened(&state.peer);

        let watcher = {
            let state = state.clone();
            let terminated = connection.terminated();
            let origin = origin.clone();
            tokio::spawn(async move {
                let event = terminated.await;
                if state.terminate() {
                    tracing::warn!(origin = %origin, event = %event, "Session lost its connection");
                }
            })
        };

        tracing::info!(
            origin = %origin,
            protocol = %protocol,
            concurrency = ?self.options.concurrency,
            "Session opened"
        );

        let timeout = self.options.default_timeout();
        Ok(Session {
            origin,
            protocol,
            defaults: self.options.headers,
            timeout,
            connection,
            gate,
            state,
            watcher,
        })
    }
}

/// Lifetime bookkeeping shared with the connection watcher.
struct SessionState {
    alive: AtomicBool,
    requests: Counter,
    started: Instant,
    opened_at: SystemTime,
    closed_at: Mutex<Option<SystemTime>>,
    peer: PeerLabels,
    telemetry: Arc<dyn Telemetry>,
}

impl SessionState {
    /// Flip to disconnected. Returns true for the first caller only.
    fn terminate(&self) -> bool {
        if !self.alive.swap(false, Ordering::SeqCst) {
            return false;
        }
        *self.closed_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(SystemTime::now());
        let lifetime = self.started.elapsed();
        let requests = self.requests.get();
        self.telemetry.session_closed(&self.peer, lifetime, requests);
        tracing::info!(
            host = %self.peer.host,
            port = self.peer.port,
            lifetime_ms = lifetime.as_millis() as u64,
            requests,
            "Session closed"
        );
        true
    }
}

/// One connection to one origin, and the requests made over it.
pub struct Session {
    origin: Origin,
    protocol: Protocol,
    defaults: Headers,
    timeout: Duration,
    connection: Arc<dyn Connection>,
    gate: Option<ConcurrencyGate>,
    state: Arc<SessionState>,
    watcher: JoinHandle<()>,
}

impl Session {
    pub fn builder(origin: impl Into<String>) -> SessionBuilder {
        SessionBuilder {
            origin: origin.into(),
            options: SessionOptions::default(),
            transport: Arc::new(H2Transport),
            telemetry: Arc::new(MetricsTelemetry),
        }
    }

    /// Connect to `origin` over HTTP/2 with `options`.
    pub async fn connect(origin: &str, options: SessionOptions) -> Result<Self, SessionError> {
        Self::builder(origin).options(options).connect().await
    }

    /// Open a session, run `f` with it, and close it however `f` ends.
    pub async fn scope<F, Fut, T, E>(origin: &str, options: SessionOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<SessionError>,
    {
        Self::builder(origin).options(options).scope(f).await
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Response, SessionError> {
        self.request(Method::Get, path, options).await
    }

    pub async fn post(&self, path: &str, options: RequestOptions) -> Result<Response, SessionError> {
        self.request(Method::Post, path, options).await
    }

    pub async fn put(&self, path: &str, options: RequestOptions) -> Result<Response, SessionError> {
        self.request(Method::Put, path, options).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Response, SessionError> {
        self.request(Method::Delete, path, options).await
    }

    pub async fn patch(&self, path: &str, options: RequestOptions) -> Result<Response, SessionError> {
        self.request(Method::Patch, path, options).await
    }

    pub async fn head(&self, path: &str, options: RequestOptions) -> Result<Response, SessionError> {
        self.request(Method::Head, path, options).await
    }

    pub async fn options(&self, path: &str, options: RequestOptions) -> Result<Response, SessionError> {
        self.request(Method::Options, path, options).await
    }

    /// Run one request, through the gate when one is configured.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response, SessionError> {
        if !self.is_alive() {
            return Err(SessionError::NotConnected {
                origin: self.origin.to_string(),
            });
        }

        let lifecycle = RequestLifecycle::new(self, method, path, options);
        let result = match &self.gate {
            Some(gate) => gate.run(lifecycle.run()).await,
            None => lifecycle.run().await,
        };
        self.state.requests.incr();
        result
    }

    /// Close the connection. Later calls do nothing.
    pub fn close(&self) {
        if self.state.terminate() {
            self.connection.close();
            self.watcher.abort();
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::SeqCst)
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Requests finished so far, successful or not.
    pub fn request_count(&self) -> i64 {
        self.state.requests.get()
    }

    pub fn opened_at(&self) -> SystemTime {
        self.state.opened_at
    }

    pub fn closed_at(&self) -> Option<SystemTime> {
        *self
            .state
            .closed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn default_headers(&self) -> &Headers {
        &self.defaults
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    pub fn gate(&self) -> Option<&ConcurrencyGate> {
        self.gate.as_ref()
    }

    pub(crate) fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    pub(crate) fn telemetry(&self) -> &dyn Telemetry {
        self.state.telemetry.as_ref()
    }

    pub(crate) fn peer(&self) -> &PeerLabels {
        &self.state.peer
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("origin", &self.origin)
            .field("protocol", &self.protocol)
            .field("alive", &self.is_alive())
            .field("requests", &self.request_count())
            .finish()
    }
}

/// Closes the session when the scope that owns it ends.
struct CloseOnExit(Arc<Session>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.0.close();
    }
}
