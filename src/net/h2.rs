//! HTTP/2 transport on hyper.
//!
//! # Responsibilities
//! - Dial the origin (TCP, then TLS with ALPN `h2` for secure origins)
//! - Run the hyper HTTP/2 handshake (prior knowledge for `h2c`)
//! - Drive the connection in a background task and report its terminal event
//! - Translate header blocks into hyper requests and responses into events
//!
//! # Design Decisions
//! - One `SendRequest` handle per connection, cloned per stream
//! - Dropping a stream's pending response or body resets the HTTP/2 stream
//! - Keep-alive ping failures surface as `ConnectionEvent::Timeout`

use std::future::Future;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http2::{self, SendRequest};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::http::headers::{
    Headers, PSEUDO_AUTHORITY, PSEUDO_METHOD, PSEUDO_PATH, PSEUDO_SCHEME, PSEUDO_STATUS,
};
use crate::net::{
    tls, ConnectTarget, Connection, ConnectionEvent, StreamEvent, StreamHandle, Transport,
    TransportError,
};
use crate::session::{Origin, Scheme};

/// Dials real HTTP/2 connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct H2Transport;

impl Transport for H2Transport {
    fn connect<'a>(
        &'a self,
        target: &'a ConnectTarget,
    ) -> BoxFuture<'a, Result<Box<dyn Connection>, TransportError>> {
        Box::pin(async move {
            let connection = H2Connection::connect(target).await?;
            Ok(Box::new(connection) as Box<dyn Connection>)
        })
    }
}

/// A live hyper HTTP/2 connection.
pub struct H2Connection {
    origin: Origin,
    sender: SendRequest<Full<Bytes>>,
    events: watch::Receiver<Option<ConnectionEvent>>,
    close_tx: watch::Sender<bool>,
}

impl H2Connection {
    pub async fn connect(target: &ConnectTarget) -> Result<Self, TransportError> {
        let origin = target.origin.clone();
        let tcp = tokio::time::timeout(
            target.connect_timeout,
            TcpStream::connect((origin.host(), origin.port())),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout(target.connect_timeout))??;
        tcp.set_nodelay(true)?;

        let mut builder = http2::Builder::new(TokioExecutor::new());
        builder.timer(TokioTimer::new());
        if let Some(interval) = target.keep_alive_interval {
            builder
                .keep_alive_interval(interval)
                .keep_alive_timeout(target.keep_alive_timeout)
                .keep_alive_while_idle(true);
        }

        let (events_tx, events) = watch::channel(None);
        let (close_tx, close_rx) = watch::channel(false);

        let sender = match origin.scheme() {
            Scheme::Https => {
                let stream = tls::connect(tcp, origin.host(), &target.tls).await?;
                let (sender, connection) = builder
                    .handshake::<_, Full<Bytes>>(TokioIo::new(stream))
                    .await?;
                spawn_driver(origin.clone(), connection, close_rx, events_tx);
                sender
            }
            Scheme::Http => {
                let (sender, connection) = builder
                    .handshake::<_, Full<Bytes>>(TokioIo::new(tcp))
                    .await?;
                spawn_driver(origin.clone(), connection, close_rx, events_tx);
                sender
            }
        };

        tracing::debug!(origin = %origin, "HTTP/2 connection established");

        Ok(Self {
            origin,
            sender,
            events,
            close_tx,
        })
    }
}

/// Poll the hyper connection until it ends or a close is requested.
fn spawn_driver<C>(
    origin: Origin,
    connection: C,
    mut close_rx: watch::Receiver<bool>,
    events_tx: watch::Sender<Option<ConnectionEvent>>,
) where
    C: Future<Output = hyper::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        let event = tokio::select! {
            result = connection => match result {
                Ok(()) => ConnectionEvent::Closed,
                Err(e) if e.is_timeout() => ConnectionEvent::Timeout,
                Err(e) => ConnectionEvent::Error(e.to_string()),
            },
            _ = close_rx.changed() => ConnectionEvent::Closed,
        };
        tracing::debug!(origin = %origin, event = %event, "HTTP/2 connection finished");
        let _ = events_tx.send(Some(event));
    });
}

impl Connection for H2Connection {
    fn open_stream(
        &self,
        head: Headers,
    ) -> BoxFuture<'_, Result<Box<dyn StreamHandle>, TransportError>> {
        let mut sender = self.sender.clone();
        Box::pin(async move {
            let request = build_request(&self.origin, &head)?;
            sender.ready().await?;
            Ok(Box::new(H2Stream {
                state: StreamState::Open(sender, request),
            }) as Box<dyn StreamHandle>)
        })
    }

    fn terminated(&self) -> BoxFuture<'static, ConnectionEvent> {
        let mut events = self.events.clone();
        Box::pin(async move {
            loop {
                let current = events.borrow_and_update().clone();
                if let Some(event) = current {
                    return event;
                }
                if events.changed().await.is_err() {
                    let last = events.borrow().clone();
                    return last.unwrap_or(ConnectionEvent::Closed);
                }
            }
        })
    }

    fn close(&self) {
        let _ = self.close_tx.send(true);
    }
}

/// Build a hyper request head from pseudo-fields and headers.
fn build_request(origin: &Origin, head: &Headers) -> Result<hyper::Request<()>, TransportError> {
    let method = head
        .get_str(PSEUDO_METHOD)
        .ok_or(TransportError::StreamState("missing :method"))?;
    let path = head.get_str(PSEUDO_PATH).unwrap_or("/");
    let scheme = head.get_str(PSEUDO_SCHEME).unwrap_or(origin.scheme().as_str());
    let authority = head
        .get_str(PSEUDO_AUTHORITY)
        .map(str::to_string)
        .unwrap_or_else(|| origin.authority());

    let mut builder = hyper::Request::builder()
        .method(method)
        .uri(format!("{}://{}{}", scheme, authority, path))
        .version(hyper::Version::HTTP_2);
    for (name, value) in head.regular() {
        for v in value.iter() {
            builder = builder.header(name, v);
        }
    }
    builder
        .body(())
        .map_err(|e| TransportError::InvalidRequest(e.to_string()))
}

/// Convert response metadata into a header block with `:status`.
fn response_headers(status: hyper::StatusCode, map: &hyper::HeaderMap) -> Headers {
    let mut headers = Headers::new();
    headers.insert(PSEUDO_STATUS, status.as_str());
    for (name, value) in map {
        headers.append(name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    headers
}

type ResponseFuture = BoxFuture<'static, hyper::Result<hyper::Response<Incoming>>>;

enum StreamState {
    Open(SendRequest<Full<Bytes>>, hyper::Request<()>),
    Awaiting(ResponseFuture),
    Receiving(Incoming),
    Finished,
}

struct H2Stream {
    state: StreamState,
}

impl StreamHandle for H2Stream {
    fn end(&mut self, body: Option<Bytes>) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            match std::mem::replace(&mut self.state, StreamState::Finished) {
                StreamState::Open(mut sender, request) => {
                    let (parts, ()) = request.into_parts();
                    let request =
                        hyper::Request::from_parts(parts, Full::new(body.unwrap_or_default()));
                    self.state = StreamState::Awaiting(Box::pin(sender.send_request(request)));
                    Ok(())
                }
                other => {
                    self.state = other;
                    Err(TransportError::StreamState("stream already ended"))
                }
            }
        })
    }

    fn next_event(&mut self) -> BoxFuture<'_, StreamEvent> {
        Box::pin(async move {
            loop {
                match std::mem::replace(&mut self.state, StreamState::Finished) {
                    StreamState::Awaiting(pending) => {
                        return match pending.await {
                            Ok(response) => {
                                let (parts, body) = response.into_parts();
                                self.state = StreamState::Receiving(body);
                                StreamEvent::Response(response_headers(parts.status, &parts.headers))
                            }
                            Err(e) => StreamEvent::Error(e.into()),
                        };
                    }
                    StreamState::Receiving(mut body) => match body.frame().await {
                        Some(Ok(frame)) => {
                            self.state = StreamState::Receiving(body);
                            // trailers are dropped
                            if let Ok(data) = frame.into_data() {
                                if !data.is_empty() {
                                    return StreamEvent::Data(data);
                                }
                            }
                        }
                        Some(Err(e)) => return StreamEvent::Error(e.into()),
                        None => return StreamEvent::End,
                    },
                    open @ StreamState::Open(..) => {
                        self.state = open;
                        return StreamEvent::Error(TransportError::StreamState("request not sent"));
                    }
                    StreamState::Finished => return StreamEvent::End,
                }
            }
        })
    }

    fn close(&mut self) {
        self.state = StreamState::Finished;
    }
}
