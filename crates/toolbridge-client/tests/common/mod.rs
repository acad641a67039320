//! Scripted in-memory transport shared by the integration suites.
//!
//! [`pair`] returns the client half ([`MockTransport`]) and a [`ServerSide`]
//! the test drives as a fake tool server.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use toolbridge_client::{Capabilities, Session, SessionConfig};
use toolbridge_transport::{
    AtomicMetrics, Transport, TransportError, TransportMessage, TransportMetrics, TransportResult,
    TransportState, TransportType,
};

#[derive(Debug)]
enum Inbound {
    Frame(String),
    Eof,
}

/// Client half: frames the test pushes are what `receive` yields.
#[derive(Debug)]
pub struct MockTransport {
    state: parking_lot::Mutex<TransportState>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
    outbound: mpsc::UnboundedSender<Value>,
    disconnects: Arc<AtomicUsize>,
    connect_error: Option<TransportError>,
    metrics: AtomicMetrics,
}

/// Server half driven by the test.
#[derive(Debug)]
pub struct ServerSide {
    to_client: mpsc::UnboundedSender<Inbound>,
    from_client: mpsc::UnboundedReceiver<Value>,
    disconnects: Arc<AtomicUsize>,
}

pub fn pair() -> (MockTransport, ServerSide) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    let disconnects = Arc::new(AtomicUsize::new(0));

    let transport = MockTransport {
        state: parking_lot::Mutex::new(TransportState::Disconnected),
        inbound: tokio::sync::Mutex::new(inbound),
        outbound,
        disconnects: Arc::clone(&disconnects),
        connect_error: None,
        metrics: AtomicMetrics::new(),
    };
    let server = ServerSide {
        to_client,
        from_client,
        disconnects,
    };
    (transport, server)
}

/// A pair whose `connect` always fails.
pub fn unreachable_pair() -> (MockTransport, ServerSide) {
    let (mut transport, server) = pair();
    transport.connect_error = Some(TransportError::ConnectionFailed(
        "connection refused".to_string(),
    ));
    (transport, server)
}

#[async_trait]
impl Transport for MockTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::Memory
    }

    async fn state(&self) -> TransportState {
        self.state.lock().clone()
    }

    async fn connect(&self) -> TransportResult<()> {
        if let Some(err) = &self.connect_error {
            *self.state.lock() = TransportState::Failed {
                reason: err.to_string(),
            };
            return Err(err.clone());
        }
        *self.state.lock() = TransportState::Connected;
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        *self.state.lock() = TransportState::Disconnected;
        Ok(())
    }

    async fn send(&self, message: TransportMessage) -> TransportResult<()> {
        if !matches!(*self.state.lock(), TransportState::Connected) {
            return Err(TransportError::ConnectionLost("not connected".to_string()));
        }
        self.metrics.record_sent(message.size());
        let frame: Value = serde_json::from_slice(&message.payload)?;
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::SendFailed("server side dropped".to_string()))
    }

    async fn receive(&self) -> TransportResult<Option<TransportMessage>> {
        let mut inbound = self.inbound.lock().await;
        match inbound.recv().await {
            Some(Inbound::Frame(frame)) => {
                self.metrics.record_received(frame.len());
                Ok(Some(TransportMessage::new(frame)))
            }
            Some(Inbound::Eof) | None => Ok(None),
        }
    }

    async fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }

    fn endpoint(&self) -> Option<String> {
        Some("mock://tool-server".to_string())
    }
}

impl ServerSide {
    /// Next frame the client sent. Panics if none arrives within 5 seconds.
    pub async fn next_frame(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.from_client.recv())
            .await
            .expect("client sent nothing")
            .expect("client side dropped")
    }

    /// Next frame, asserting it is a request for `method`. Returns its id.
    pub async fn expect_request(&mut self, method: &str) -> Value {
        let frame = self.next_frame().await;
        assert_eq!(frame["method"], method, "unexpected frame {frame}");
        frame["id"].clone()
    }

    /// Non-blocking check for an already-sent frame.
    pub fn try_next_frame(&mut self) -> Option<Value> {
        self.from_client.try_recv().ok()
    }

    pub fn send(&self, frame: Value) {
        self.send_raw(frame.to_string());
    }

    pub fn send_raw(&self, frame: impl Into<String>) {
        let _ = self.to_client.send(Inbound::Frame(frame.into()));
    }

    pub fn reply(&self, id: &Value, result: Value) {
        self.send(json!({"jsonrpc": "2.0", "id": id, "result": result}));
    }

    pub fn reply_error(&self, id: &Value, code: i32, message: &str) {
        self.send(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": code, "message": message}
        }));
    }

    pub fn reply_text(&self, id: &Value, text: &str) {
        self.reply(id, json!({"content": [{"type": "text", "text": text}]}));
    }

    /// Close the stream from the server end.
    pub fn eof(&self) {
        let _ = self.to_client.send(Inbound::Eof);
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Play the server side of a successful handshake.
    pub async fn handshake(&mut self) {
        let id = self.expect_request("initialize").await;
        self.reply(&id, init_result());
        let initialized = self.next_frame().await;
        assert_eq!(initialized["method"], "notifications/initialized");
        assert!(initialized.get("id").is_none());
    }

    /// Answer one `tools/list` request with `tools` and no further pages.
    pub async fn serve_tools(&mut self, tools: Value) {
        let id = self.expect_request("tools/list").await;
        self.reply(&id, json!({"tools": tools}));
    }
}

pub fn init_result() -> Value {
    json!({
        "protocolVersion": "2025-06-18",
        "capabilities": {"tools": {"listChanged": true}},
        "serverInfo": {"name": "mock-server", "version": "1.0.0"}
    })
}

pub fn calculator_tools() -> Value {
    json!([
        {
            "name": "add",
            "description": "Add two numbers",
            "inputSchema": {
                "type": "object",
                "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
                "required": ["a", "b"]
            }
        },
        {
            "name": "echo",
            "description": "Echo text back",
            "inputSchema": {
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }
        },
        {"name": "fail", "inputSchema": {"type": "object"}}
    ])
}

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// A session that has completed the handshake.
pub async fn ready_session() -> (Session<MockTransport>, ServerSide) {
    ready_session_with(SessionConfig::default()).await
}

pub async fn ready_session_with(config: SessionConfig) -> (Session<MockTransport>, ServerSide) {
    let (transport, mut server) = pair();
    let capabilities = config.capabilities;
    let session = Session::open_with_config(transport, config);

    let (negotiated, ()) = tokio::join!(
        session.initialize(&capabilities, TIMEOUT),
        server.handshake()
    );
    negotiated.expect("handshake should succeed");
    (session, server)
}

/// Default capabilities, for tests that call `initialize` directly.
pub fn caps() -> Capabilities {
    Capabilities::default()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
