//! Loopback control process for tests.
//!
//! Binds a WebSocket server to `127.0.0.1:0`, accepts one client, records
//! every text frame it receives and lets the test push frames or hang up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;

/// How long [`TestServer::next_frame`] waits.
const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Action the server task performs on behalf of the test.
enum ServerAction {
    Text(String),
    HangUp,
}

/// A control process stand-in.
pub(crate) struct TestServer {
    port: u16,
    connected: Arc<AtomicBool>,
    frames_rx: mpsc::UnboundedReceiver<String>,
    action_tx: mpsc::UnboundedSender<ServerAction>,
}

impl TestServer {
    /// Binds and starts accepting a single client.
    pub(crate) async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        let connected = Arc::new(AtomicBool::new(false));
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (action_tx, mut action_rx) = mpsc::unbounded_channel();

        let connected_flag = Arc::clone(&connected);
        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            connected_flag.store(true, Ordering::SeqCst);

            let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws_stream.split();

            loop {
                tokio::select! {
                    message = read.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            let _ = frames_tx.send(text.as_str().to_owned());
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        _ => {}
                    },
                    action = action_rx.recv() => match action {
                        Some(ServerAction::Text(text)) => {
                            if write.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerAction::HangUp) | None => {
                            let _ = write.close().await;
                            break;
                        }
                    },
                }
            }
        });

        Self {
            port,
            connected,
            frames_rx,
            action_tx,
        }
    }

    /// WebSocket URL of the server.
    pub(crate) fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Returns `true` once a TCP client has connected.
    pub(crate) fn was_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Waits for the next frame sent by the client.
    pub(crate) async fn next_frame(&mut self) -> Option<String> {
        timeout(FRAME_TIMEOUT, self.frames_rx.recv()).await.ok().flatten()
    }

    /// Waits for the next frame that is not a heartbeat.
    pub(crate) async fn next_command(&mut self) -> Option<String> {
        loop {
            let frame = self.next_frame().await?;
            if !frame.contains("\"Heartbeat\"") {
                return Some(frame);
            }
        }
    }

    /// Returns every frame received so far, after a short settle delay.
    pub(crate) async fn drain(&mut self) -> Vec<String> {
        sleep(Duration::from_millis(30)).await;
        let mut frames = Vec::new();
        while let Ok(frame) = self.frames_rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Sends a text frame to the client.
    pub(crate) fn push(&self, text: &str) {
        let _ = self.action_tx.send(ServerAction::Text(text.to_string()));
    }

    /// Closes the connection from the server side.
    pub(crate) fn hang_up(&self) {
        let _ = self.action_tx.send(ServerAction::HangUp);
    }
}
