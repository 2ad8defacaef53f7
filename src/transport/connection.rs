//! WebSocket connection to the control process.
//!
//! [`ConnectionManager`] owns the single transport instance, drives
//! [`ConnectionState`] and owns the heartbeat ticker.
//!
//! # Connection Task
//!
//! A successful [`ConnectionManager::open`] spawns a tokio task that handles:
//!
//! - Heartbeats: one per configured period after the liveness probe
//! - Outgoing frames queued by [`ConnectionManager::send`], in call order
//! - Incoming text frames, forwarded as [`TransportEvent::Frame`]
//!
//! The liveness probe is written by `open` itself, before the state becomes
//! `Open`, so it precedes every frame queued through `send`. The heartbeat
//! ticker lives inside the task and stops the moment the task leaves its
//! loop. When the task ends it sets the state back to
//! `Disconnected`, reports queued frames as dropped and emits a single
//! [`TransportEvent::Closed`]. It never reconnects.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::protocol::heartbeat_frame;

// ============================================================================
// Types
// ============================================================================

/// Client-side WebSocket stream.
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Receiver of transport events, returned by [`ConnectionManager::open`].
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport.
    #[default]
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Frames may be sent.
    Open,
    /// Owner requested shutdown; the task is closing the socket.
    Closing,
}

impl ConnectionState {
    /// Returns `true` if frames may be sent.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Event emitted by the connection task.
#[derive(Debug)]
pub enum TransportEvent {
    /// An inbound text frame.
    Frame(String),
    /// The connection ended. `error` is set for transport faults.
    Closed {
        /// The fault that ended the connection, if any.
        error: Option<Error>,
        /// Frames accepted by `send` but never written.
        dropped: usize,
    },
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the connection task.
enum ConnectionCommand {
    /// Write a text frame.
    Send(String),
    /// Close the socket and stop.
    Shutdown,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Shared state between manager handles and the connection task.
struct ConnectionInner {
    /// WebSocket URL of the control process.
    endpoint: String,
    /// Period between heartbeats.
    heartbeat_interval: Duration,
    /// Handshake timeout.
    connect_timeout: Duration,
    /// Single writer of the connection state.
    state: watch::Sender<ConnectionState>,
    /// Channel to the running connection task, if any.
    command_tx: Mutex<Option<mpsc::UnboundedSender<ConnectionCommand>>>,
}

/// Owner of the connection to the control process.
///
/// Cheap to clone; clones share the same transport.
///
/// # Example
///
/// ```ignore
/// let manager = ConnectionManager::new(&RelayConfig::default());
/// let mut events = manager.open().await?;
///
/// manager.send(r#"{"action":"Reset"}"#.to_string())?;
///
/// while let Some(event) = events.recv().await {
///     // handle TransportEvent::Frame / TransportEvent::Closed
/// }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates a disconnected manager. No I/O is performed.
    #[must_use]
    pub fn new(config: &RelayConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(ConnectionInner {
                endpoint: config.endpoint.clone(),
                heartbeat_interval: config.heartbeat_interval,
                connect_timeout: config.connect_timeout,
                state,
                command_tx: Mutex::new(None),
            }),
        }
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Returns a receiver that observes state transitions.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Returns the configured endpoint.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Opens the transport and starts the heartbeat.
    ///
    /// Makes exactly one connection attempt. The first heartbeat is written
    /// before the state becomes `Open`.
    ///
    /// # Errors
    ///
    /// - [`Error::Connection`] if the manager is not disconnected or the
    ///   handshake fails
    /// - [`Error::ConnectionTimeout`] if the handshake exceeds the timeout
    /// - [`Error::WebSocket`] if the liveness heartbeat cannot be written
    pub async fn open(&self) -> Result<TransportEvents> {
        let claimed = self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Disconnected {
                *state = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });

        if !claimed {
            return Err(Error::connection(format!(
                "Cannot open connection in state {}",
                self.state()
            )));
        }

        debug!(endpoint = %self.inner.endpoint, "Connecting to control process");

        let mut ws_stream = match timeout(
            self.inner.connect_timeout,
            connect_async(self.inner.endpoint.as_str()),
        )
        .await
        {
            Ok(Ok((ws_stream, _response))) => ws_stream,
            Ok(Err(e)) => {
                self.inner.state.send_replace(ConnectionState::Disconnected);
                return Err(Error::connection(format!(
                    "WebSocket connect to {} failed: {e}",
                    self.inner.endpoint
                )));
            }
            Err(_) => {
                self.inner.state.send_replace(ConnectionState::Disconnected);
                return Err(Error::connection_timeout(
                    self.inner.connect_timeout.as_millis() as u64,
                ));
            }
        };

        if let Err(e) = ws_stream
            .send(Message::Text(heartbeat_frame().into()))
            .await
        {
            error!(error = %e, "Failed to send liveness heartbeat");
            self.inner.state.send_replace(ConnectionState::Disconnected);
            return Err(e.into());
        }
        trace!("Heartbeat sent");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        *self.inner.command_tx.lock() = Some(command_tx);
        self.inner.state.send_replace(ConnectionState::Open);

        info!(endpoint = %self.inner.endpoint, "Connection to control process established");

        tokio::spawn(Self::run_connection(
            ws_stream,
            command_rx,
            event_tx,
            Arc::clone(&self.inner),
        ));

        Ok(event_rx)
    }

    /// Queues a text frame for the transport.
    ///
    /// Fire-and-forget: there is no acknowledgement and no retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] if the state is not `Open`. Nothing is
    /// written in that case.
    pub fn send(&self, raw: String) -> Result<()> {
        if !self.state().is_open() {
            return Err(Error::NotConnected);
        }

        let guard = self.inner.command_tx.lock();
        let command_tx = guard.as_ref().ok_or(Error::NotConnected)?;
        command_tx
            .send(ConnectionCommand::Send(raw))
            .map_err(|_| Error::NotConnected)
    }

    /// Closes the transport.
    ///
    /// The state moves to `Closing` and then to `Disconnected` once the
    /// connection task has stopped. Does nothing unless the state is `Open`.
    pub fn close(&self) {
        let closing = self.inner.state.send_if_modified(|state| {
            if state.is_open() {
                *state = ConnectionState::Closing;
                true
            } else {
                false
            }
        });

        if !closing {
            return;
        }

        if let Some(command_tx) = self.inner.command_tx.lock().as_ref() {
            let _ = command_tx.send(ConnectionCommand::Shutdown);
        }
    }

    /// Connection task: heartbeat, outbound writes, inbound reads.
    async fn run_connection(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
        inner: Arc<ConnectionInner>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        // The liveness probe already went out in `open`.
        let period = inner.heartbeat_interval;
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let failure = loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if !inner.state.borrow().is_open() {
                        continue;
                    }
                    if let Err(e) = ws_write.send(Message::Text(heartbeat_frame().into())).await {
                        error!(error = %e, "Failed to send heartbeat");
                        break Some(e.into());
                    }
                    trace!("Heartbeat sent");
                }

                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(len = text.len(), "Frame received");
                            let _ = event_tx.send(TransportEvent::Frame(text.as_str().to_owned()));
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "WebSocket closed by remote");
                            break None;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break Some(e.into());
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break None;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(frame)) => {
                            if let Err(e) = ws_write.send(Message::Text(frame.into())).await {
                                error!(error = %e, "Failed to send frame");
                                break Some(e.into());
                            }
                            trace!("Frame sent");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break None;
                        }

                        None => {
                            debug!("Command channel closed");
                            let _ = ws_write.close().await;
                            break None;
                        }
                    }
                }
            }
        };

        drop(heartbeat);
        inner.command_tx.lock().take();
        inner.state.send_replace(ConnectionState::Disconnected);

        let dropped = Self::drop_queued_frames(&mut command_rx);

        info!(endpoint = %inner.endpoint, "Connection to control process closed");

        let _ = event_tx.send(TransportEvent::Closed {
            error: failure,
            dropped,
        });
    }

    /// Discards frames queued but never written and returns how many there were.
    fn drop_queued_frames(command_rx: &mut mpsc::UnboundedReceiver<ConnectionCommand>) -> usize {
        command_rx.close();

        let mut dropped = 0usize;
        while let Ok(command) = command_rx.try_recv() {
            if let ConnectionCommand::Send(_) = command {
                dropped += 1;
            }
        }

        if dropped > 0 {
            warn!(dropped, error = %Error::NotConnected, "Dropped queued frames on close");
        }

        dropped
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::Value;
    use tokio::net::TcpListener;

    use crate::transport::test_server::TestServer;

    fn config_for(url: &str, heartbeat_ms: u64) -> RelayConfig {
        RelayConfig::new()
            .with_endpoint(url)
            .with_heartbeat_interval(Duration::from_millis(heartbeat_ms))
            .with_connect_timeout(Duration::from_secs(2))
    }

    fn is_heartbeat(frame: &str) -> bool {
        serde_json::from_str::<Value>(frame)
            .map(|v| v["action"] == "Heartbeat")
            .unwrap_or(false)
    }

    #[test]
    fn test_state_default_and_display() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Closing.is_open());
    }

    #[tokio::test]
    async fn test_send_while_disconnected() {
        let server = TestServer::start().await;
        let manager = ConnectionManager::new(&config_for(&server.url(), 50));

        let result = manager.send("{}".to_string());

        assert!(matches!(result, Err(Error::NotConnected)));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!server.was_connected());
    }

    #[tokio::test]
    async fn test_open_sends_immediate_heartbeat() {
        let mut server = TestServer::start().await;
        let manager = ConnectionManager::new(&config_for(&server.url(), 60_000));

        let _events = manager.open().await.expect("open");
        assert_eq!(manager.state(), ConnectionState::Open);

        let frame = server.next_frame().await.expect("heartbeat");
        assert!(is_heartbeat(&frame));

        manager.close();
    }

    #[tokio::test]
    async fn test_periodic_heartbeats_stop_on_close() {
        let mut server = TestServer::start().await;
        let manager = ConnectionManager::new(&config_for(&server.url(), 100));

        let mut events = manager.open().await.expect("open");
        tokio::time::sleep(Duration::from_millis(350)).await;

        let beats = server.drain().await.iter().filter(|f| is_heartbeat(f)).count();
        assert!((3..=5).contains(&beats), "expected ~4 heartbeats, got {beats}");

        manager.close();
        match events.recv().await {
            Some(TransportEvent::Closed { error, dropped }) => {
                assert!(error.is_none());
                assert_eq!(dropped, 0);
            }
            other => panic!("expected Closed, got {other:?}"),
        }
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        server.drain().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(server.drain().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_forwards_frame() {
        let mut server = TestServer::start().await;
        let manager = ConnectionManager::new(&config_for(&server.url(), 60_000));
        let _events = manager.open().await.expect("open");

        manager
            .send(r#"{"action":"Reset"}"#.to_string())
            .expect("send while open");

        let frames = [
            server.next_frame().await.expect("heartbeat"),
            server.next_frame().await.expect("command"),
        ];
        assert!(is_heartbeat(&frames[0]));
        assert_eq!(frames[1], r#"{"action":"Reset"}"#);

        manager.close();
    }

    #[tokio::test]
    async fn test_inbound_frames_are_forwarded() {
        let server = TestServer::start().await;
        let manager = ConnectionManager::new(&config_for(&server.url(), 60_000));
        let mut events = manager.open().await.expect("open");

        server.push(r#"{"tab_id": 3, "message": "hi"}"#);

        match events.recv().await {
            Some(TransportEvent::Frame(text)) => assert!(text.contains("\"hi\"")),
            other => panic!("expected Frame, got {other:?}"),
        }

        manager.close();
    }

    #[tokio::test]
    async fn test_remote_close_disconnects() {
        let server = TestServer::start().await;
        let manager = ConnectionManager::new(&config_for(&server.url(), 60_000));
        let mut events = manager.open().await.expect("open");

        server.hang_up();

        loop {
            match events.recv().await {
                Some(TransportEvent::Closed { .. }) => break,
                Some(TransportEvent::Frame(_)) => continue,
                None => panic!("event channel ended without Closed"),
            }
        }

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(matches!(manager.send("{}".to_string()), Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_open_twice_is_rejected() {
        let server = TestServer::start().await;
        let manager = ConnectionManager::new(&config_for(&server.url(), 60_000));
        let _events = manager.open().await.expect("open");

        assert!(matches!(manager.open().await, Err(Error::Connection { .. })));
        assert_eq!(manager.state(), ConnectionState::Open);

        manager.close();
    }

    #[tokio::test]
    async fn test_open_failure_returns_to_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let manager = ConnectionManager::new(&config_for(&format!("ws://127.0.0.1:{port}"), 50));
        let result = manager.open().await;

        assert!(result.is_err());
        assert!(result.unwrap_err().is_connection_error());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_when_disconnected_is_noop() {
        let manager = ConnectionManager::new(&RelayConfig::default());
        manager.close();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_heartbeat_precedes_first_send() {
        for _ in 0..20 {
            let mut server = TestServer::start().await;
            let manager = ConnectionManager::new(&config_for(&server.url(), 60_000));
            let _events = manager.open().await.expect("open");

            manager
                .send(r#"{"action":"Reset"}"#.to_string())
                .expect("send while open");

            let first = server.next_frame().await.expect("first frame");
            assert!(is_heartbeat(&first), "first frame was {first}");

            manager.close();
        }
    }

    #[test]
    fn test_queued_frames_are_counted_as_dropped() {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel();
        assert!(command_tx.send(ConnectionCommand::Send("a".to_string())).is_ok());
        assert!(command_tx.send(ConnectionCommand::Shutdown).is_ok());
        assert!(command_tx.send(ConnectionCommand::Send("b".to_string())).is_ok());

        assert_eq!(ConnectionManager::drop_queued_frames(&mut command_rx), 2);
        assert!(command_tx.send(ConnectionCommand::Shutdown).is_err());
    }
}
