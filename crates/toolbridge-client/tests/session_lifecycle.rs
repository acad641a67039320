//! Handshake, state transitions and teardown.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use toolbridge_client::{
    Capabilities, SessionBuilder, SessionConfig, SessionError, SessionState, TimeoutConfig,
    connect,
};
use toolbridge_transport::{Transport, TransportError};

use common::{TIMEOUT, caps, pair, ready_session, unreachable_pair};

#[tokio::test]
async fn test_open_performs_no_io() {
    let (transport, mut server) = pair();
    let session = toolbridge_client::Session::open(transport);

    assert_eq!(session.state(), SessionState::Unopened);
    assert!(session.capabilities().is_none());
    assert_eq!(session.pending_count(), 0);
    assert!(server.try_next_frame().is_none());
}

#[tokio::test]
async fn test_handshake_negotiates_capabilities() {
    common::init_tracing();
    let (transport, mut server) = pair();
    let session = SessionBuilder::new()
        .with_client_info("agent", "9.9.9")
        .build(transport);

    let server_task = async {
        let frame = server.next_frame().await;
        assert_eq!(frame["method"], "initialize");
        assert_eq!(frame["params"]["protocolVersion"], "2025-06-18");
        assert_eq!(frame["params"]["clientInfo"]["name"], "agent");
        assert_eq!(frame["params"]["clientInfo"]["version"], "9.9.9");
        assert_eq!(
            frame["params"]["capabilities"],
            json!({"roots": {"listChanged": true}})
        );
        server.reply(&frame["id"], common::init_result());

        let initialized = server.next_frame().await;
        assert_eq!(initialized["method"], "notifications/initialized");
    };

    let declared = caps();
    let (negotiated, ()) = tokio::join!(session.initialize(&declared, TIMEOUT), server_task);
    let negotiated = negotiated.unwrap();

    assert_eq!(negotiated.server_info.name, "mock-server");
    assert_eq!(negotiated.protocol_version, "2025-06-18");
    assert!(negotiated.server_supports_tools());
    assert!(negotiated.client_capabilities.roots.is_some());
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.capabilities(), Some(negotiated));
}

#[tokio::test]
async fn test_second_initialize_is_rejected() {
    let (session, _server) = ready_session().await;

    let err = session.initialize(&caps(), TIMEOUT).await.unwrap_err();
    assert_eq!(err, SessionError::AlreadyInitialized);
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_call_before_initialize_is_not_ready() {
    let (transport, mut server) = pair();
    let session = toolbridge_client::Session::open(transport);

    let err = session
        .call("echo", HashMap::new(), TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SessionError::NotReady {
            state: SessionState::Unopened
        }
    );

    let err = session.list_tools(TIMEOUT).await.unwrap_err();
    assert!(matches!(err, SessionError::NotReady { .. }));
    assert!(server.try_next_frame().is_none());
}

#[tokio::test]
async fn test_handshake_rejected_closes_session() {
    let (transport, mut server) = pair();
    let session = toolbridge_client::Session::open(transport);

    let server_task = async {
        let id = server.expect_request("initialize").await;
        server.reply_error(&id, -32602, "unsupported protocol version");
    };
    let declared = caps();
    let (result, ()) = tokio::join!(session.initialize(&declared, TIMEOUT), server_task);

    assert_eq!(
        result.unwrap_err(),
        SessionError::HandshakeRejected {
            code: -32602,
            message: "unsupported protocol version".into()
        }
    );
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(server.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout() {
    let (transport, mut server) = pair();
    let session = toolbridge_client::Session::open(transport);

    let server_task = async {
        // Read the request and never answer it.
        server.expect_request("initialize").await;
    };
    let declared = caps();
    let (result, ()) = tokio::join!(
        session.initialize(&declared, Duration::from_millis(200)),
        server_task
    );

    let err = result.unwrap_err();
    assert_eq!(
        err,
        SessionError::HandshakeTimeout {
            timeout: Duration::from_millis(200)
        }
    );
    assert!(err.is_fatal());
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.pending_count(), 0);
}

#[tokio::test]
async fn test_connect_failure_is_transport_failure() {
    let (transport, server) = unreachable_pair();
    let session = toolbridge_client::Session::open(transport);

    let err = session.initialize(&caps(), TIMEOUT).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::TransportFailure(TransportError::ConnectionFailed(
            "connection refused".into()
        ))
    );
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(server.disconnects(), 1);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (session, mut server) = ready_session().await;

    session.close().await;
    session.close().await;

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(server.disconnects(), 1);

    let err = session
        .call("echo", HashMap::new(), TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::SessionClosed);
    assert!(server.try_next_frame().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_close_releases_once() {
    let (session, server) = ready_session().await;

    let closers: Vec<_> = (0..8)
        .map(|_| {
            let session = session.clone();
            tokio::spawn(async move { session.close().await })
        })
        .collect();
    for closer in closers {
        closer.await.unwrap();
    }

    assert_eq!(server.disconnects(), 1);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_close_fails_pending_calls() {
    let (session, mut server) = ready_session().await;

    let call = {
        let session = session.clone();
        tokio::spawn(async move { session.call("echo", HashMap::new(), TIMEOUT).await })
    };
    server.expect_request("tools/call").await;
    assert_eq!(session.pending_count(), 1);

    session.close().await;

    assert_eq!(call.await.unwrap().unwrap_err(), SessionError::SessionClosed);
    assert_eq!(session.pending_count(), 0);
}

#[tokio::test]
async fn test_close_before_initialize() {
    let (transport, server) = pair();
    let session = toolbridge_client::Session::open(transport);

    session.close().await;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(server.disconnects(), 1);

    let err = session.initialize(&caps(), TIMEOUT).await.unwrap_err();
    assert_eq!(err, SessionError::SessionClosed);
}

#[tokio::test]
async fn test_peer_eof_fails_every_pending_call() {
    let (session, mut server) = ready_session().await;

    let calls: Vec<_> = ["echo", "add"]
        .into_iter()
        .map(|tool| {
            let session = session.clone();
            tokio::spawn(async move { session.call(tool, HashMap::new(), TIMEOUT).await })
        })
        .collect();
    server.expect_request("tools/call").await;
    server.expect_request("tools/call").await;

    server.eof();

    for call in calls {
        let err = call.await.unwrap().unwrap_err();
        assert!(
            matches!(err, SessionError::TransportFailure(TransportError::ConnectionLost(_))),
            "unexpected {err:?}"
        );
    }
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(session.pending_count(), 0);

    session.close().await;
    assert_eq!(server.disconnects(), 1);
}

#[tokio::test]
async fn test_eof_during_handshake() {
    let (transport, mut server) = pair();
    let session = toolbridge_client::Session::open(transport);

    let server_task = async {
        server.expect_request("initialize").await;
        server.eof();
    };
    let declared = caps();
    let (result, ()) = tokio::join!(session.initialize(&declared, TIMEOUT), server_task);

    assert!(matches!(
        result.unwrap_err(),
        SessionError::TransportFailure(_)
    ));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(server.disconnects(), 1);
}

#[tokio::test]
async fn test_connect_builds_registry() {
    let (transport, mut server) = pair();
    let config = SessionConfig {
        timeouts: TimeoutConfig::fast(),
        ..SessionConfig::default()
    };

    let server_task = async {
        server.handshake().await;
        server.serve_tools(common::calculator_tools()).await;
    };
    let (connected, ()) = tokio::join!(connect(transport, config), server_task);
    let (session, registry) = connected.unwrap();

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(
        registry.names().collect::<Vec<_>>(),
        vec!["add", "echo", "fail"]
    );
    assert_eq!(registry.describe("fail").unwrap().description, "");
}

#[tokio::test]
async fn test_connect_closes_session_on_duplicate_tools() {
    let (transport, mut server) = pair();

    let server_task = async {
        server.handshake().await;
        server
            .serve_tools(json!([
                {"name": "echo", "inputSchema": {"type": "object"}},
                {"name": "echo", "inputSchema": {"type": "object"}}
            ]))
            .await;
    };
    let (connected, ()) = tokio::join!(connect(transport, SessionConfig::default()), server_task);

    let err = connected.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Duplicate tool name in listing: echo"
    );
    assert_eq!(server.disconnects(), 1);
}

#[tokio::test]
async fn test_declared_capabilities_are_sent() {
    let (transport, mut server) = pair();
    let session = toolbridge_client::Session::open(transport);
    let declared = Capabilities::none().with_elicitation(true);

    let server_task = async {
        let frame = server.next_frame().await;
        assert_eq!(frame["params"]["capabilities"], json!({"elicitation": {}}));
        server.reply(&frame["id"], common::init_result());
        server.next_frame().await;
    };
    let (negotiated, ()) = tokio::join!(session.initialize(&declared, TIMEOUT), server_task);
    assert!(negotiated.unwrap().client_capabilities.roots.is_none());
}

#[tokio::test]
async fn test_transport_metrics_are_exposed() {
    let (session, _server) = ready_session().await;

    let metrics = session.transport_metrics().await;
    assert_eq!(metrics.messages_sent, 2);
    assert_eq!(metrics.messages_received, 1);
    assert_eq!(session.transport().endpoint().as_deref(), Some("mock://tool-server"));
}
