//! Newline-delimited frame transport over a reader/writer pair.
//!
//! [`StdioTransport`] speaks one JSON document per line. It is normally built
//! from the piped stdin/stdout of an already spawned tool server, but any
//! `AsyncRead`/`AsyncWrite` pair works (tests use `tokio::io::duplex`).
//!
//! # Interior Mutability
//!
//! - `state`, `streams`, `reader_task`: `parking_lot::Mutex`, never held across `.await`
//! - `metrics`: [`AtomicMetrics`], lock-free counters
//! - writer and receive channel: `tokio::sync::Mutex`, held across `.await`
//!
//! The writer and the receive channel sit behind separate locks, so one task
//! can wait in `receive` while others send.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::process::Child;
use tokio::sync::{Mutex as TokioMutex, mpsc};
use tokio::task::JoinHandle;
use bytes::BytesMut;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, error, trace, warn};

use crate::config::LimitsConfig;
use crate::error::{TransportError, TransportResult, validate_request_size, validate_response_size};
use crate::message::{TransportMessage, TransportMessageMetadata};
use crate::metrics::{AtomicMetrics, TransportMetrics};
use crate::traits::Transport;
use crate::types::{TransportState, TransportType};

type BoxedAsyncRead = Pin<Box<dyn AsyncRead + Send + 'static>>;
type BoxedAsyncWrite = Pin<Box<dyn AsyncWrite + Send + 'static>>;
type FrameWriter = FramedWrite<BoxedAsyncWrite, LinesCodec>;
type Inbound = TransportResult<TransportMessage>;

/// Frames buffered between the reader task and `receive`.
const RECEIVE_CHANNEL_CAPACITY: usize = 1000;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Newline-delimited transport over a reader/writer pair.
///
/// # Examples
///
/// ```rust,ignore
/// use tokio::process::Command;
/// use toolbridge_transport::{StdioTransport, Transport};
///
/// let mut child = Command::new("my-tool-server")
///     .stdin(std::process::Stdio::piped())
///     .stdout(std::process::Stdio::piped())
///     .spawn()?;
///
/// let transport = StdioTransport::from_child(&mut child)?;
/// transport.connect().await?;
/// ```
pub struct StdioTransport {
    transport_type: TransportType,
    endpoint: String,
    limits: LimitsConfig,
    state: Arc<Mutex<TransportState>>,
    metrics: Arc<AtomicMetrics>,

    /// Raw streams, consumed by the first `connect`
    streams: Mutex<Option<(BoxedAsyncRead, BoxedAsyncWrite)>>,

    writer: TokioMutex<Option<FrameWriter>>,
    receive_channel: TokioMutex<Option<mpsc::Receiver<Inbound>>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("transport_type", &self.transport_type)
            .field("endpoint", &self.endpoint)
            .field("limits", &self.limits)
            .field("state", &*self.state.lock())
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl StdioTransport {
    /// Create a transport from a spawned child process.
    ///
    /// The child must have been spawned with `stdin(Stdio::piped())` and
    /// `stdout(Stdio::piped())`. The pipes are taken out of `child`; the
    /// caller keeps ownership of the process itself.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConfigurationError`] if the child's stdin or
    /// stdout was not piped.
    pub fn from_child(child: &mut Child) -> TransportResult<Self> {
        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::ConfigurationError(
                "Child process stdin was not piped. Use Stdio::piped() when spawning.".to_string(),
            )
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::ConfigurationError(
                "Child process stdout was not piped. Use Stdio::piped() when spawning.".to_string(),
            )
        })?;

        let endpoint = child
            .id()
            .map_or_else(|| "child://exited".to_string(), |pid| format!("child://{pid}"));

        let mut transport = Self::from_raw(stdout, stdin);
        transport.transport_type = TransportType::ChildProcess;
        transport.endpoint = endpoint;
        Ok(transport)
    }

    /// Create a transport from raw async streams.
    ///
    /// `reader` is what we read frames from (a child's stdout), `writer` is
    /// where frames go (a child's stdin).
    ///
    /// ```rust
    /// use tokio::io::AsyncWriteExt;
    /// use toolbridge_transport::{StdioTransport, Transport};
    ///
    /// # tokio_test::block_on(async {
    /// let (client_read, mut peer_write) = tokio::io::duplex(1024);
    /// let (client_write, _peer_read) = tokio::io::duplex(1024);
    ///
    /// let transport = StdioTransport::from_raw(client_read, client_write);
    /// transport.connect().await.unwrap();
    ///
    /// peer_write.write_all(b"{\"jsonrpc\":\"2.0\",\"method\":\"ping\"}\n").await.unwrap();
    /// let frame = transport.receive().await.unwrap().unwrap();
    /// assert_eq!(&frame.payload[..], br#"{"jsonrpc":"2.0","method":"ping"}"#);
    /// # });
    /// ```
    pub fn from_raw<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + 'static,
        W: AsyncWrite + Send + 'static,
    {
        let boxed_reader: BoxedAsyncRead = Box::pin(reader);
        let boxed_writer: BoxedAsyncWrite = Box::pin(writer);

        Self {
            transport_type: TransportType::Stdio,
            endpoint: "stdio://".to_string(),
            limits: LimitsConfig::default(),
            state: Arc::new(Mutex::new(TransportState::Disconnected)),
            metrics: Arc::new(AtomicMetrics::new()),
            streams: Mutex::new(Some((boxed_reader, boxed_writer))),
            writer: TokioMutex::new(None),
            receive_channel: TokioMutex::new(None),
            reader_task: Mutex::new(None),
        }
    }

    /// Replace the frame size limits.
    #[must_use]
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Frame size limits in effect
    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    fn set_state(&self, new_state: TransportState) {
        let mut state = self.state.lock();
        if *state != new_state {
            trace!("Stdio transport state: {} -> {}", *state, new_state);
            *state = new_state;
        }
    }

    fn current_state(&self) -> TransportState {
        self.state.lock().clone()
    }

    fn setup_streams(&self) -> TransportResult<(FrameWriter, mpsc::Receiver<Inbound>)> {
        let (reader, writer) = self.streams.lock().take().ok_or_else(|| {
            TransportError::ConfigurationError("Raw streams already consumed".to_string())
        })?;

        let mut lines = FramedRead::new(
            BufReader::new(reader),
            BoundedLines::new(self.limits.max_response_size),
        );
        let frame_writer = FramedWrite::new(writer, LinesCodec::new());

        let (tx, rx) = mpsc::channel(RECEIVE_CHANNEL_CAPACITY);
        let metrics = Arc::clone(&self.metrics);
        let limits = self.limits.clone();

        let handle = tokio::spawn(async move {
            while let Some(result) = lines.next().await {
                let line = match result {
                    Ok(Line::Frame(line)) => line,
                    Ok(Line::Oversize) => {
                        warn!(
                            max = limits.max_response_size,
                            "Inbound frame exceeds the size limit, discarding it"
                        );
                        metrics.frames_rejected.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    Err(e) => {
                        error!("Failed to read frame: {}", e);
                        let _ = tx
                            .send(Err(TransportError::ReceiveFailed(e.to_string())))
                            .await;
                        break;
                    }
                };

                let size = line.len();
                if let Err(e) = validate_response_size(size, &limits) {
                    error!("Inbound frame rejected: {}", e);
                    metrics.frames_rejected.fetch_add(1, Ordering::Relaxed);
                    continue;
                }

                let Some(message) = Self::parse_frame(line) else {
                    trace!("Skipping blank line");
                    continue;
                };

                metrics.record_received(size);
                if tx.send(Ok(message)).await.is_err() {
                    debug!("Receive channel closed, stopping reader task");
                    break;
                }
            }

            debug!("Stdio reader task completed");
        });

        *self.reader_task.lock() = Some(handle);
        Ok((frame_writer, rx))
    }

    fn parse_frame(line: String) -> Option<TransportMessage> {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return None;
        }

        Some(TransportMessage::with_metadata(
            line.to_string(),
            TransportMessageMetadata::with_content_type(JSON_CONTENT_TYPE),
        ))
    }

    fn serialize_frame(message: &TransportMessage) -> TransportResult<String> {
        let json_str = std::str::from_utf8(&message.payload)
            .map_err(|e| TransportError::SerializationFailed(e.to_string()))?;

        // Must run before JSON validation: a raw newline is legal JSON whitespace.
        if json_str.contains('\n') || json_str.contains('\r') {
            return Err(TransportError::ProtocolError(
                "Message contains embedded newlines".to_string(),
            ));
        }

        let _: serde_json::Value = serde_json::from_str(json_str)?;

        Ok(json_str.to_string())
    }

    fn stop_reader(&self) {
        if let Some(handle) = self.reader_task.lock().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn transport_type(&self) -> TransportType {
        self.transport_type
    }

    async fn state(&self) -> TransportState {
        self.current_state()
    }

    async fn connect(&self) -> TransportResult<()> {
        if matches!(self.current_state(), TransportState::Connected) {
            return Ok(());
        }

        self.set_state(TransportState::Connecting);

        match self.setup_streams() {
            Ok((frame_writer, rx)) => {
                *self.writer.lock().await = Some(frame_writer);
                *self.receive_channel.lock().await = Some(rx);
                self.metrics.connections.fetch_add(1, Ordering::Relaxed);
                self.set_state(TransportState::Connected);
                debug!(endpoint = %self.endpoint, "Stdio transport connected");
                Ok(())
            }
            Err(e) => {
                self.metrics
                    .failed_connections
                    .fetch_add(1, Ordering::Relaxed);
                self.set_state(TransportState::Failed {
                    reason: e.to_string(),
                });
                error!("Failed to connect stdio transport: {}", e);
                Err(e)
            }
        }
    }

    async fn disconnect(&self) -> TransportResult<()> {
        if matches!(self.current_state(), TransportState::Disconnected) {
            return Ok(());
        }

        self.set_state(TransportState::Disconnecting);

        // Aborting the reader drops the channel sender, which releases any
        // task parked in `receive` before we take its lock.
        self.stop_reader();
        *self.receive_channel.lock().await = None;

        if let Some(mut writer) = self.writer.lock().await.take()
            && let Err(e) = SinkExt::<String>::close(&mut writer).await
        {
            debug!("Error closing frame writer: {}", e);
        }

        self.set_state(TransportState::Disconnected);
        debug!(endpoint = %self.endpoint, "Stdio transport disconnected");
        Ok(())
    }

    async fn send(&self, message: TransportMessage) -> TransportResult<()> {
        let state = self.current_state();
        if !matches!(state, TransportState::Connected) {
            return Err(TransportError::ConnectionFailed(format!(
                "Transport not connected: {state}"
            )));
        }

        let line = Self::serialize_frame(&message)?;
        let size = line.len();
        validate_request_size(size, &self.limits)?;

        let started = Instant::now();
        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(TransportError::SendFailed(
                "Frame writer not available".to_string(),
            ));
        };

        // `SinkExt::send` flushes, so the frame is on the wire when this returns.
        if let Err(e) = writer.send(line).await {
            error!("Failed to send frame: {}", e);
            self.set_state(TransportState::Failed {
                reason: e.to_string(),
            });
            return Err(TransportError::SendFailed(e.to_string()));
        }

        self.metrics.record_sent(size);
        self.metrics
            .update_latency_us(started.elapsed().as_micros() as u64);
        trace!(
            correlation_id = message.correlation_id().unwrap_or("-"),
            "Sent frame: {} bytes",
            size
        );
        Ok(())
    }

    async fn receive(&self) -> TransportResult<Option<TransportMessage>> {
        let mut receive_channel = self.receive_channel.lock().await;
        let Some(receiver) = receive_channel.as_mut() else {
            let state = self.current_state();
            return Err(TransportError::ConnectionFailed(format!(
                "Transport not connected: {state}"
            )));
        };

        match receiver.recv().await {
            Some(Ok(message)) => {
                trace!("Received frame: {} bytes", message.size());
                Ok(Some(message))
            }
            Some(Err(e)) => {
                self.set_state(TransportState::Failed {
                    reason: e.to_string(),
                });
                Err(e)
            }
            None => {
                debug!(endpoint = %self.endpoint, "Peer closed the stream");
                *receive_channel = None;
                if matches!(self.current_state(), TransportState::Connected) {
                    warn!("Stdio transport lost its peer");
                    self.set_state(TransportState::Failed {
                        reason: "peer closed the stream".to_string(),
                    });
                }
                Ok(None)
            }
        }
    }

    async fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }

    fn endpoint(&self) -> Option<String> {
        Some(self.endpoint.clone())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

/// One inbound line, or the marker for a line over the size limit.
#[derive(Debug)]
enum Line {
    Frame(String),
    Oversize,
}

/// `LinesCodec` capped at the inbound frame limit.
///
/// An over-long line is reported as [`Line::Oversize`] rather than an error,
/// so the stream stays usable while the rest of that line is discarded.
#[derive(Debug)]
struct BoundedLines(LinesCodec);

impl BoundedLines {
    fn new(max_length: Option<usize>) -> Self {
        Self(max_length.map_or_else(LinesCodec::new, LinesCodec::new_with_max_length))
    }

    fn bounded(
        result: Result<Option<String>, LinesCodecError>,
    ) -> Result<Option<Line>, LinesCodecError> {
        match result {
            Ok(line) => Ok(line.map(Line::Frame)),
            Err(LinesCodecError::MaxLineLengthExceeded) => Ok(Some(Line::Oversize)),
            Err(e) => Err(e),
        }
    }
}

impl Decoder for BoundedLines {
    type Item = Line;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, LinesCodecError> {
        Self::bounded(self.0.decode(buf))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Line>, LinesCodecError> {
        Self::bounded(self.0.decode_eof(buf))
    }
}
