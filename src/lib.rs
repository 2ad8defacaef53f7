//! Tab Relay - WebSocket relay between a control process and browser tabs.
//!
//! This library relays commands from browser-side originators to a locally
//! running control process and routes the control process's replies into
//! the addressed browser tab.
//!
//! # Architecture
//!
//! The relay follows a client model:
//!
//! - **Control process**: WebSocket server at `ws://localhost:8765`
//! - **Relay (Rust)**: one WebSocket client, one event loop
//! - **Host browser**: supplies tab events, live tabs and input injection
//!   through the [`Environment`] and [`Injector`] traits
//!
//! Key design principles:
//!
//! - One connection, opened once, never reconnected automatically
//! - One active target tab at a time; newer ready tabs supersede older ones
//! - Every outbound command carries a fresh UUIDv4 and the active `tabId`
//! - Fire-and-forget at every boundary: failures are reported, not retried
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tab_relay::{Command, Relay, RelayConfig, Result, Role, TabEvent, TabId};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let relay = Relay::new(RelayConfig::default(), Arc::new(injector), Arc::new(browser))?;
//!     let handle = relay.start().await;
//!
//!     let tab = TabId::new(42).expect("non-zero");
//!     handle.tab_event(TabEvent::loaded(tab, "https://gemini.google.com/app"))?;
//!     handle.submit(Command::register(Role::DungeonMaster))?;
//!
//!     handle.closed().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | [`RelayConfig`] and defaults |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Commands and wire frames |
//! | [`relay`] | Target tracker, encoder, router and event loop |
//! | [`transport`] | WebSocket connection manager |

// ============================================================================
// Modules
// ============================================================================

/// Relay configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for tabs, destinations and messages.
pub mod identifiers;

/// Originator commands and wire frames.
pub mod protocol;

/// Tab-affinity relay: tracker, encoder, router, event loop.
pub mod relay;

/// WebSocket transport layer.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::RelayConfig;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CorrelationId, Destination, TabId};

// Protocol types
pub use protocol::{Command, InboundMessage, OutboundMessage, RECOVERY_PROMPT, Role};

// Relay types
pub use relay::{
    Delivery, Environment, Injector, MessageRouter, OutboundEncoder, Relay, RelayHandle,
    ReportHandler, TabEvent, TabStatus, TargetTracker,
};

// Transport types
pub use transport::{ConnectionManager, ConnectionState, TransportEvent};
