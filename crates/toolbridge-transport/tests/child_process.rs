//! `StdioTransport::from_child` against a real process.
//!
//! `cat` echoes every frame back, which is enough to exercise both pipes.

#![cfg(unix)]

use std::process::Stdio;

use pretty_assertions::assert_eq;
use tokio::process::Command;
use toolbridge_transport::{
    StdioTransport, Transport, TransportError, TransportMessage, TransportState, TransportType,
};

fn spawn_cat() -> tokio::process::Child {
    Command::new("cat")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("cat should be available on unix test hosts")
}

#[tokio::test]
async fn test_child_process_echo() {
    let mut child = spawn_cat();
    let transport = StdioTransport::from_child(&mut child).unwrap();

    assert_eq!(transport.transport_type(), TransportType::ChildProcess);
    assert!(transport.endpoint().unwrap().starts_with("child://"));

    transport.connect().await.unwrap();

    let frame = r#"{"jsonrpc":"2.0","method":"ping","id":1}"#;
    transport.send(TransportMessage::new(frame)).await.unwrap();

    let echoed = transport.receive().await.unwrap().unwrap();
    assert_eq!(echoed.payload, frame.as_bytes());

    let metrics = transport.metrics().await;
    assert_eq!(metrics.messages_sent, 1);
    assert_eq!(metrics.messages_received, 1);

    transport.disconnect().await.unwrap();
    assert_eq!(transport.state().await, TransportState::Disconnected);

    // Closing stdin lets cat exit on its own.
    let status = child.wait().await.unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_child_exit_is_end_of_stream() {
    let mut child = spawn_cat();
    let transport = StdioTransport::from_child(&mut child).unwrap();
    transport.connect().await.unwrap();

    child.kill().await.unwrap();

    assert_eq!(transport.receive().await.unwrap(), None);
    assert!(!transport.is_connected().await);
}

#[tokio::test]
async fn test_unpiped_child_is_rejected() {
    let mut child = Command::new("cat")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();

    let result = StdioTransport::from_child(&mut child);
    assert!(matches!(result, Err(TransportError::ConfigurationError(_))));
}
