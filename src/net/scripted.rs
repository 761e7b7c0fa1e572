//! In-process transport that answers streams from a script.
//!
//! # Responsibilities
//! - Record every request sent (header block, body, whether it was closed)
//! - Answer each stream with a scripted event sequence chosen per request
//! - Simulate connection failures and unreachable peers
//!
//! # Design Decisions
//! - Delays use tokio time, so tests can run on a paused clock
//! - A script that runs out of steps leaves the stream pending forever
//! - One transport serves one live connection at a time

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use tokio::sync::watch;

use crate::http::headers::{Headers, PSEUDO_METHOD, PSEUDO_PATH, PSEUDO_STATUS};
use crate::net::{
    ConnectTarget, Connection, ConnectionEvent, StreamEvent, StreamHandle, Transport,
    TransportError,
};

/// One step of a scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Delay(Duration),
    Response(Headers),
    Data(Bytes),
    End,
    Error(String),
}

/// A scripted reply, built step by step.
#[derive(Debug, Clone, Default)]
pub struct Script {
    steps: Vec<ScriptStep>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status, one body chunk, end.
    pub fn reply(status: u16, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let script = Self::new().status(status);
        if body.is_empty() {
            script.end()
        } else {
            script.data(body).end()
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.steps.push(ScriptStep::Delay(delay));
        self
    }

    /// Response metadata with just a `:status`.
    pub fn status(self, status: u16) -> Self {
        let mut headers = Headers::new();
        headers.insert(PSEUDO_STATUS, status.to_string());
        self.headers(headers)
    }

    /// Response metadata exactly as given (pseudo-fields included).
    pub fn headers(mut self, headers: Headers) -> Self {
        self.steps.push(ScriptStep::Response(headers));
        self
    }

    pub fn data(mut self, chunk: impl Into<Bytes>) -> Self {
        self.steps.push(ScriptStep::Data(chunk.into()));
        self
    }

    pub fn end(mut self) -> Self {
        self.steps.push(ScriptStep::End);
        self
    }

    pub fn error(mut self, reason: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Error(reason.into()));
        self
    }
}

/// A request as the transport saw it.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub head: Headers,
    pub body: Option<Bytes>,
    closed: Arc<AtomicBool>,
}

impl SentRequest {
    pub fn method(&self) -> Option<&str> {
        self.head.get_str(PSEUDO_METHOD)
    }

    pub fn path(&self) -> Option<&str> {
        self.head.get_str(PSEUDO_PATH)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.get_str(name)
    }

    /// Whether the stream handle was closed by its owner.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

type Responder = dyn Fn(&SentRequest) -> Script + Send + Sync;

struct Shared {
    responder: Box<Responder>,
    sent: Mutex<Vec<SentRequest>>,
    events: watch::Sender<Option<ConnectionEvent>>,
    connects: AtomicUsize,
    refuse: AtomicBool,
}

/// Transport answering every stream through `responder`.
#[derive(Clone)]
pub struct ScriptedTransport {
    shared: Arc<Shared>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&SentRequest) -> Script + Send + Sync + 'static,
    {
        let (events, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                responder: Box::new(responder),
                sent: Mutex::new(Vec::new()),
                events,
                connects: AtomicUsize::new(0),
                refuse: AtomicBool::new(false),
            }),
        }
    }

    /// Transport whose connects always fail.
    pub fn unreachable() -> Self {
        let transport = Self::new(|_| Script::new());
        transport.shared.refuse.store(true, Ordering::SeqCst);
        transport
    }

    /// Requests sent so far, in the order their bodies were sent.
    pub fn sent(&self) -> Vec<SentRequest> {
        self.shared
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn connect_count(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Fire a terminal event on the live connection.
    pub fn terminate(&self, event: ConnectionEvent) {
        self.shared.events.send_replace(Some(event));
    }

    fn is_terminated(&self) -> bool {
        self.shared.events.borrow().is_some()
    }
}

impl Transport for ScriptedTransport {
    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>, TransportError>> {
        Box::pin(async move {
            if self.shared.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    format!("{} refused the connection", target.origin),
                )));
            }
            self.shared.connects.fetch_add(1, Ordering::SeqCst);
            self.shared.events.send_replace(None);
            Ok(Box::new(ScriptedConnection {
                transport: self.clone(),
            }) as Box<dyn Connection>)
        })
    }
}

struct ScriptedConnection {
    transport: ScriptedTransport,
}

impl Connection for ScriptedConnection {
    fn open_stream(
        &self,
        head: Headers,
    ) -> BoxFuture<'_, Result<Box<dyn StreamHandle>, TransportError>> {
        Box::pin(async move {
            if self.transport.is_terminated() {
                return Err(TransportError::ConnectionClosed(
                    "scripted connection is gone".into(),
                ));
            }
            Ok(Box::new(ScriptedStream {
                transport: self.transport.clone(),
                head: Some(head),
                steps: VecDeque::new(),
                closed: Arc::new(AtomicBool::new(false)),
            }) as Box<dyn StreamHandle>)
        })
    }

    fn terminated(&self) -> BoxFuture<'static, ConnectionEvent> {
        let mut events = self.transport.shared.events.subscribe();
        Box::pin(async move {
            loop {
                let current = events.borrow_and_update().clone();
                if let Some(event) = current {
                    return event;
                }
                if events.changed().await.is_err() {
                    return ConnectionEvent::Closed;
                }
            }
        })
    }

    fn close(&self) {
        self.transport.terminate(ConnectionEvent::Closed);
    }
}

struct ScriptedStream {
    transport: ScriptedTransport,
    head: Option<Headers>,
    steps: VecDeque<ScriptStep>,
    closed: Arc<AtomicBool>,
}

impl StreamHandle for ScriptedStream {
    fn end(&mut self, body: Option<Bytes>) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            let head = self
                .head
                .take()
                .ok_or(TransportError::StreamState("stream already ended"))?;
            let request = SentRequest {
                head,
                body,
                closed: self.closed.clone(),
            };
            let script = (self.transport.shared.responder)(&request);
            self.steps = script.steps.into();
            self.transport
                .shared
                .sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);
            Ok(())
        })
    }

    fn next_event(&mut self) -> BoxFuture<'_, StreamEvent> {
        Box::pin(async move {
            if self.closed.load(Ordering::SeqCst) {
                return StreamEvent::Error(TransportError::StreamState("stream closed"));
            }
            if self.head.is_some() {
                return StreamEvent::Error(TransportError::StreamState("request not sent"));
            }
            while let Some(step) = self.steps.pop_front() {
                match step {
                    ScriptStep::Delay(delay) => tokio::time::sleep(delay).await,
                    ScriptStep::Response(headers) => return StreamEvent::Response(headers),
                    ScriptStep::Data(chunk) => return StreamEvent::Data(chunk),
                    ScriptStep::End => return StreamEvent::End,
                    ScriptStep::Error(reason) => {
                        return StreamEvent::Error(TransportError::Reset(reason))
                    }
                }
            }
            std::future::pending::<StreamEvent>().await
        })
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.steps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Origin;

    fn target() -> ConnectTarget {
        ConnectTarget {
            origin: Origin::parse("http://scripted.test:80").unwrap(),
            tls: Default::default(),
            connect_timeout: Duration::from_secs(1),
            keep_alive_interval: None,
            keep_alive_timeout: Duration::from_secs(1),
        }
    }

    fn get(path: &str) -> Headers {
        [(PSEUDO_METHOD, "GET"), (PSEUDO_PATH, path)].into_iter().collect()
    }

    #[tokio::test]
    async fn test_stream_replays_script() {
        let transport = ScriptedTransport::new(|req| {
            Script::new().status(200).data("hello ").data(req.path().unwrap_or("").to_string()).end()
        });
        let connection = transport.connect(&target()).await.unwrap();
        let mut stream = connection.open_stream(get("/world")).await.unwrap();
        stream.end(None).await.unwrap();

        assert!(matches!(stream.next_event().await, StreamEvent::Response(h) if h.get_str(":status") == Some("200")));
        assert!(matches!(stream.next_event().await, StreamEvent::Data(b) if &b[..] == b"hello "));
        assert!(matches!(stream.next_event().await, StreamEvent::Data(b) if &b[..] == b"/world"));
        assert!(matches!(stream.next_event().await, StreamEvent::End));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method(), Some("GET"));
        assert!(!sent[0].is_closed());
        stream.close();
        assert!(sent[0].is_closed());
    }

    #[tokio::test]
    async fn test_events_before_end_are_misuse() {
        let transport = ScriptedTransport::new(|_| Script::reply(200, ""));
        let connection = transport.connect(&target()).await.unwrap();
        let mut stream = connection.open_stream(get("/")).await.unwrap();

        assert!(matches!(
            stream.next_event().await,
            StreamEvent::Error(TransportError::StreamState(_))
        ));
        stream.end(None).await.unwrap();
        assert!(stream.end(None).await.is_err());
    }

    #[tokio::test]
    async fn test_terminate_resolves_watchers_and_blocks_streams() {
        let transport = ScriptedTransport::new(|_| Script::reply(200, "ok"));
        let connection = transport.connect(&target()).await.unwrap();
        let terminated = connection.terminated();

        transport.terminate(ConnectionEvent::Error("boom".into()));
        assert_eq!(terminated.await, ConnectionEvent::Error("boom".into()));
        assert!(connection.open_stream(get("/")).await.is_err());

        // a fresh connect starts clean
        let connection = transport.connect(&target()).await.unwrap();
        assert!(connection.open_stream(get("/")).await.is_ok());
        assert_eq!(transport.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let transport = ScriptedTransport::unreachable();
        let err = transport.connect(&target()).await.err().unwrap();
        assert!(matches!(err, TransportError::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused));
    }
}
