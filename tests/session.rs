//! Session behaviour against the scripted transport.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use h2_session::net::ScriptedTransport;
use h2_session::observability::RequestOutcome;
use h2_session::{Method, Protocol, RequestOptions, Session, SessionError, SessionOptions};
use serde_json::{json, Value};

mod common;

use common::{Observed, RecordingTelemetry};

#[tokio::test]
async fn test_request_header_overrides_session_default() {
    let transport = common::scripted_backend();
    let telemetry = RecordingTelemetry::default();
    let session = common::scripted_session(
        &transport,
        &telemetry,
        SessionOptions::default().header("x-custom", "session"),
    )
    .await;

    let response = session
        .get("/echo", RequestOptions::new().header("X-Custom", "request"))
        .await
        .unwrap();

    assert_eq!(response.header("x-custom"), Some("request"));
    assert_eq!(response.request().headers.get_str("x-custom"), Some("request"));
    assert_eq!(transport.sent()[0].header("x-custom"), Some("request"));
}

#[tokio::test]
async fn test_post_json_body_is_encoded() {
    let transport = common::scripted_backend();
    let telemetry = RecordingTelemetry::default();
    let session = common::scripted_session(&transport, &telemetry, SessionOptions::default()).await;

    let response = session
        .post("/echo", RequestOptions::new().body(json!({"message": "hi"})))
        .await
        .unwrap();

    let sent = &transport.sent()[0];
    let expected = br#"{"message":"hi"}"#;
    assert_eq!(sent.body.as_deref(), Some(&expected[..]));
    assert_eq!(sent.header("content-type"), Some("application/json"));
    assert_eq!(sent.header("content-length"), Some(expected.len().to_string().as_str()));

    let echoed: Value = response.json().unwrap().unwrap();
    assert_eq!(echoed, json!({"message": "hi"}));
}

#[tokio::test]
async fn test_text_body_defaults_to_octet_stream() {
    let transport = common::scripted_backend();
    let telemetry = RecordingTelemetry::default();
    let session = common::scripted_session(&transport, &telemetry, SessionOptions::default()).await;

    session
        .put("/echo", RequestOptions::new().body("raw text"))
        .await
        .unwrap();
    session
        .patch(
            "/echo",
            RequestOptions::new()
                .header("content-type", "text/plain")
                .body(b"bytes".to_vec()),
        )
        .await
        .unwrap();

    let sent = transport.sent();
    assert_eq!(sent[0].header("content-type"), Some("application/octet-stream"));
    assert_eq!(sent[0].body.as_deref(), Some(&b"raw text"[..]));
    assert_eq!(sent[1].header("content-type"), Some("text/plain"));
    assert_eq!(sent[1].header("content-length"), Some("5"));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_against_slow_endpoint() {
    let transport = common::scripted_backend();
    let telemetry = RecordingTelemetry::default();
    let session = common::scripted_session(&transport, &telemetry, SessionOptions::default()).await;

    let err = session
        .get(
            "/delay/5000",
            RequestOptions::new().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();

    match &err {
        SessionError::Timeout {
            origin,
            method,
            path,
            timeout,
        } => {
            assert_eq!(origin, common::SCRIPTED_ORIGIN);
            assert_eq!(*method, Method::Get);
            assert_eq!(path, "/delay/5000");
            assert_eq!(timeout.as_millis(), 100);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(transport.sent()[0].is_closed());
    assert!(session.is_alive());
    assert_eq!(session.request_count(), 1);
}

#[tokio::test]
async fn test_head_has_no_body() {
    let transport = common::scripted_backend();
    let telemetry = RecordingTelemetry::default();
    let session = common::scripted_session(&transport, &telemetry, SessionOptions::default()).await;

    let response = session.head("/status/200", RequestOptions::new()).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.body().len(), 0);
    assert!(response.text().is_none());
    assert!(response.json::<Value>().unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_requests_are_counted() {
    let transport = common::scripted_backend();
    let telemetry = RecordingTelemetry::default();
    let session = common::scripted_session(&transport, &telemetry, SessionOptions::default()).await;

    let (a, b, c) = tokio::join!(
        session.get("/delay/30", RequestOptions::new()),
        session.get("/delay/10", RequestOptions::new()),
        session.options("/", RequestOptions::new()),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(session.request_count(), 3);
    assert!(session.is_alive());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let transport = common::scripted_backend();
    let telemetry = RecordingTelemetry::default();
    let session = common::scripted_session(&transport, &telemetry, SessionOptions::default()).await;

    assert!(session.is_alive());
    session.get("/", RequestOptions::new()).await.unwrap();
    assert!(session.is_alive());
    assert!(session.closed_at().is_none());

    session.close();
    session.close();
    assert!(!session.is_alive());
    assert!(session.closed_at().unwrap() >= session.opened_at());

    let err = session.delete("/", RequestOptions::new()).await.unwrap_err();
    assert!(matches!(err, SessionError::NotConnected { .. }));
    assert_eq!(session.request_count(), 1);

    drop(session);
    assert_eq!(
        telemetry.count(|e| matches!(e, Observed::SessionClosed { .. })),
        1
    );
    assert!(telemetry
        .events()
        .contains(&Observed::SessionClosed { requests: 1 }));
}

#[tokio::test]
async fn test_protocol_validation_matrix() {
    let cases = [
        ("http://scripted.test", Some(Protocol::H2), false),
        ("https://scripted.test", Some(Protocol::H2c), false),
        ("http://scripted.test", Some(Protocol::H2c), true),
        ("https://scripted.test", Some(Protocol::H2), true),
        ("http://scripted.test", None, true),
        ("https://scripted.test", None, true),
    ];

    for (origin, protocol, ok) in cases {
        let transport = common::scripted_backend();
        let options = SessionOptions {
            protocol,
            ..Default::default()
        };
        let result = Session::builder(origin)
            .options(options)
            .transport(transport.clone())
            .connect()
            .await;

        if ok {
            let session = result.unwrap();
            let expected = if origin.starts_with("https") {
                Protocol::H2
            } else {
                Protocol::H2c
            };
            assert_eq!(session.protocol(), expected);
        } else {
            assert!(matches!(result, Err(SessionError::ProtocolMismatch { .. })));
            assert_eq!(transport.connect_count(), 0, "no connection on mismatch");
        }
    }
}

#[tokio::test]
async fn test_invalid_options_fail_before_connecting() {
    let transport = common::scripted_backend();
    let result = Session::builder(common::SCRIPTED_ORIGIN)
        .options(SessionOptions::default().concurrency(0))
        .transport(transport.clone())
        .connect()
        .await;

    assert!(matches!(result, Err(SessionError::Config(_))));
    assert_eq!(transport.connect_count(), 0);

    let result = Session::builder("ftp://scripted.test")
        .transport(transport.clone())
        .connect()
        .await;
    assert!(matches!(result, Err(SessionError::InvalidOrigin { .. })));
}

#[tokio::test]
async fn test_telemetry_once_per_lifecycle() {
    let transport = common::scripted_backend();
    let telemetry = RecordingTelemetry::default();
    let session = common::scripted_session(&transport, &telemetry, SessionOptions::default()).await;

    session.get("/status/404?x=1", RequestOptions::new()).await.unwrap();
    let _ = session.get("/error", RequestOptions::new()).await;
    let _ = session
        .get("/delay/1000", RequestOptions::new().timeout(Duration::from_millis(10)))
        .await;

    assert_eq!(
        telemetry.finished(),
        vec![
            Observed::RequestFinished {
                method: Method::Get,
                route: "/status/404".into(),
                outcome: RequestOutcome::Status(404),
            },
            Observed::RequestFinished {
                method: Method::Get,
                route: "/error".into(),
                outcome: RequestOutcome::Error("transport"),
            },
            Observed::RequestFinished {
                method: Method::Get,
                route: "/delay/1000".into(),
                outcome: RequestOutcome::Error("timeout"),
            },
        ]
    );
    assert_eq!(telemetry.count(|e| matches!(e, Observed::RequestStarted)), 3);
    assert_eq!(telemetry.count(|e| matches!(e, Observed::SessionOpened)), 1);
}

#[tokio::test]
async fn test_scope_closes_on_every_exit() {
    // connect failures surface from the scope itself
    let result: Result<(), SessionError> = Session::scope(
        "http://127.0.0.1:1",
        SessionOptions {
            connect_timeout_ms: 200,
            ..Default::default()
        },
        |_session| async { Ok(()) },
    )
    .await;
    assert!(matches!(result, Err(SessionError::Transport(_))));

    for path in ["/", "/error"] {
        let transport = common::scripted_backend();
        let telemetry = RecordingTelemetry::default();
        let kept = Arc::new(Mutex::new(None));
        let keep = kept.clone();

        let result: Result<i32, SessionError> = Session::builder(common::SCRIPTED_ORIGIN)
            .transport(transport)
            .telemetry(telemetry.clone())
            .scope(|session| async move {
                *keep.lock().unwrap() = Some(session.clone());
                let response = session.get(path, RequestOptions::new()).await?;
                Ok(response.status())
            })
            .await;

        assert_eq!(result.is_ok(), path == "/");
        let session = kept.lock().unwrap().take().unwrap();
        assert!(!session.is_alive());
        assert_eq!(
            telemetry.count(|e| matches!(e, Observed::SessionClosed { .. })),
            1
        );
    }
}

#[tokio::test]
async fn test_unreachable_origin() {
    let result = Session::builder(common::SCRIPTED_ORIGIN)
        .transport(ScriptedTransport::unreachable())
        .connect()
        .await;
    assert!(matches!(result, Err(SessionError::Transport(_))));
}
