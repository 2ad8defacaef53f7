//! Tab-affinity relay.
//!
//! The relay is one tokio task that owns the [`TargetTracker`],
//! [`OutboundEncoder`] and [`MessageRouter`] and multiplexes three inputs:
//!
//! | Input | Source | Handling |
//! |-------|--------|----------|
//! | [`Command`] | Originators via [`RelayHandle::submit`] | Encode, send |
//! | [`TabEvent`] | Host browser via [`RelayHandle::tab_event`] | Update tracker, prepare tab |
//! | [`TransportEvent`] | Connection task | Route to tab |
//!
//! Inputs are processed one at a time, so tracker reads and writes never
//! overlap. Errors never reach the originator: they are logged and passed
//! to the optional [`ReportHandler`].
//!
//! # Example
//!
//! ```ignore
//! let relay = Relay::new(RelayConfig::from_env(), injector, environment)?
//!     .with_report_handler(Box::new(|e| eprintln!("relay: {e}")));
//!
//! let handle = relay.start().await;
//! handle.tab_event(TabEvent::loaded(tab_id, "https://gemini.google.com/app"))?;
//! handle.submit(Command::register(Role::HeroCreator))?;
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod collaborator;
mod encoder;
mod router;
mod tracker;

#[cfg(test)]
pub(crate) mod mock;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::future::pending;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::protocol::Command;
use crate::transport::{ConnectionManager, ConnectionState, TransportEvent, TransportEvents};

// ============================================================================
// Re-exports
// ============================================================================

pub use collaborator::{Delivery, Environment, Injector, TabEvent, TabStatus};
pub use encoder::OutboundEncoder;
pub use router::MessageRouter;
pub use tracker::TargetTracker;

// ============================================================================
// Types
// ============================================================================

/// Diagnostic callback.
///
/// Called once for every error the relay swallows.
pub type ReportHandler = Box<dyn Fn(&Error) + Send + Sync>;

/// Internal commands for the relay loop.
enum RelayCommand {
    /// Encode and send an originator command.
    Submit(Command),
    /// Apply a tab lifecycle event.
    Tab(TabEvent),
    /// Close the connection and stop.
    Shutdown,
}

// ============================================================================
// Relay
// ============================================================================

/// A configured, not yet started relay.
pub struct Relay {
    config: RelayConfig,
    injector: Arc<dyn Injector>,
    environment: Arc<dyn Environment>,
    report_handler: Option<ReportHandler>,
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("config", &self.config)
            .field("report_handler", &self.report_handler.is_some())
            .finish_non_exhaustive()
    }
}

impl Relay {
    /// Creates a relay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn new(
        config: RelayConfig,
        injector: Arc<dyn Injector>,
        environment: Arc<dyn Environment>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            injector,
            environment,
            report_handler: None,
        })
    }

    /// Sets the diagnostic callback.
    #[must_use]
    pub fn with_report_handler(mut self, handler: ReportHandler) -> Self {
        self.report_handler = Some(handler);
        self
    }

    /// Opens the connection and spawns the relay loop.
    ///
    /// A single connection attempt is made. If it fails the failure is
    /// reported and the loop runs anyway: tabs are still tracked and
    /// outbound commands are dropped with [`Error::NotConnected`].
    pub async fn start(self) -> RelayHandle {
        let connection = ConnectionManager::new(&self.config);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let relay_loop = RelayLoop {
            config: self.config,
            connection: connection.clone(),
            tracker: TargetTracker::new(),
            encoder: OutboundEncoder::new(),
            router: MessageRouter::new(),
            injector: self.injector,
            environment: self.environment,
            report_handler: self.report_handler,
        };

        let transport_rx = match connection.open().await {
            Ok(events) => Some(events),
            Err(e) => {
                relay_loop.report(e);
                None
            }
        };

        tokio::spawn(relay_loop.run(command_rx, transport_rx));

        RelayHandle {
            command_tx,
            connection,
        }
    }
}

// ============================================================================
// RelayHandle
// ============================================================================

/// Handle to a running relay.
///
/// Cheap to clone. Dropping every handle stops the relay.
#[derive(Clone)]
pub struct RelayHandle {
    command_tx: mpsc::UnboundedSender<RelayCommand>,
    connection: ConnectionManager,
}

impl fmt::Debug for RelayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayHandle")
            .field("running", &self.is_running())
            .field("connection", &self.connection)
            .finish()
    }
}

impl RelayHandle {
    /// Submits an originator command.
    ///
    /// Returns once the command is queued. Whether it is actually sent is
    /// reported through the relay's report handler, never here.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RelayClosed`] if the relay has stopped.
    pub fn submit(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(RelayCommand::Submit(command))
            .map_err(|_| Error::RelayClosed)
    }

    /// Feeds a tab lifecycle event into the relay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RelayClosed`] if the relay has stopped.
    pub fn tab_event(&self, event: TabEvent) -> Result<()> {
        self.command_tx
            .send(RelayCommand::Tab(event))
            .map_err(|_| Error::RelayClosed)
    }

    /// Returns the connection state.
    #[inline]
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Returns `true` while the relay loop is running.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// Closes the connection and stops the relay loop.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(RelayCommand::Shutdown);
    }

    /// Waits until the relay loop has stopped.
    pub async fn closed(&self) {
        self.command_tx.closed().await;
    }
}

// ============================================================================
// RelayLoop
// ============================================================================

/// State owned by the relay task.
struct RelayLoop {
    config: RelayConfig,
    connection: ConnectionManager,
    tracker: TargetTracker,
    encoder: OutboundEncoder,
    router: MessageRouter,
    injector: Arc<dyn Injector>,
    environment: Arc<dyn Environment>,
    report_handler: Option<ReportHandler>,
}

impl RelayLoop {
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<RelayCommand>,
        mut transport_rx: Option<TransportEvents>,
    ) {
        info!(endpoint = %self.config.endpoint, "Relay started");

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(RelayCommand::Submit(command)) => self.handle_submit(command),
                        Some(RelayCommand::Tab(event)) => self.handle_tab_event(event).await,
                        Some(RelayCommand::Shutdown) => {
                            debug!("Shutdown requested");
                            break;
                        }
                        None => {
                            debug!("All relay handles dropped");
                            break;
                        }
                    }
                }

                event = next_transport_event(&mut transport_rx) => {
                    match event {
                        Some(TransportEvent::Frame(raw)) => self.handle_inbound(&raw).await,
                        Some(TransportEvent::Closed { error, dropped }) => {
                            transport_rx = None;
                            self.handle_closed(error, dropped);
                        }
                        None => transport_rx = None,
                    }
                }
            }
        }

        self.connection.close();
        command_rx.close();

        info!(
            sent = self.encoder.sent_count(),
            dropped_outbound = self.encoder.dropped_count(),
            delivered = self.router.delivered_count(),
            dropped_inbound = self.router.dropped_count(),
            "Relay stopped"
        );
    }

    fn handle_submit(&mut self, command: Command) {
        if let Err(e) = self.encoder.send(command, &self.tracker, &self.connection) {
            self.report(e);
        }
    }

    async fn handle_tab_event(&mut self, event: TabEvent) {
        match event {
            TabEvent::Updated {
                tab_id,
                status: TabStatus::Complete,
                url,
            } if self.config.is_target_url(&url) => {
                if self.tracker.on_ready(tab_id)
                    && let Err(e) = self.injector.prepare(tab_id).await
                {
                    self.report(e);
                }
                if let Err(e) = self.environment.open_originator(tab_id).await {
                    self.report(e);
                }
            }
            TabEvent::Updated { .. } => {}
            TabEvent::Removed { tab_id } => {
                self.tracker.on_gone(tab_id);
            }
        }
    }

    /// Reports the end of the transport and every frame it never wrote.
    fn handle_closed(&mut self, error: Option<Error>, dropped: usize) {
        match error {
            Some(e) => self.report(e),
            None => info!("Control process closed the connection"),
        }

        self.encoder.record_unsent(dropped);
        for _ in 0..dropped {
            self.report(Error::NotConnected);
        }
    }

    async fn handle_inbound(&mut self, raw: &str) {
        let result = self
            .router
            .on_inbound(raw, self.environment.as_ref(), self.injector.as_ref())
            .await;

        if let Err(e) = result {
            self.report(e);
        }
    }

    /// Logs a swallowed error and forwards it to the report handler.
    fn report(&self, error: Error) {
        if error.is_recoverable() {
            warn!(error = %error, "Relay dropped a message");
        } else {
            error!(error = %error, "Relay error");
        }

        if let Some(handler) = &self.report_handler {
            handler(&error);
        }
    }
}

/// Next transport event, or never if there is no transport.
async fn next_transport_event(rx: &mut Option<TransportEvents>) -> Option<TransportEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
