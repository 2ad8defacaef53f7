//! WebSocket transport layer.
//!
//! This module handles communication between the relay and the control
//! process via a single WebSocket client connection.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                          ┌─────────────────┐
//! │  Relay (Rust)        │                          │ Control process │
//! │                      │        WebSocket         │                 │
//! │  ConnectionManager   │─────────────────────────►│ WebSocket       │
//! │  → connection task   │◄─────────────────────────│ server          │
//! │                      │    ws://localhost:8765   │                 │
//! └──────────────────────┘                          └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionManager::new` - Disconnected, no I/O
//! 2. `ConnectionManager::open` - Connecting, then Open; heartbeat starts
//! 3. `ConnectionManager::send` - Queue frames while Open
//! 4. `ConnectionManager::close` or remote close - Disconnected; heartbeat stops
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection manager and connection task |

// ============================================================================
// Submodules
// ============================================================================

/// Connection manager and connection task.
pub mod connection;

#[cfg(test)]
pub(crate) mod test_server;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{ConnectionManager, ConnectionState, TransportEvent, TransportEvents};
