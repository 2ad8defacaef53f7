//! WebSocket protocol message types.
//!
//! This module defines the message format for communication between the
//! relay and the control process.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Heartbeat` | Relay → Control | Liveness probe |
//! | `OutboundMessage` | Relay → Control | Originator command with `uuid`/`tabId` |
//! | `InboundMessage` | Control → Relay | Text addressed to a tab |
//!
//! There is no handshake and no acknowledgement in either direction.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Originator commands and agent roles |
//! | `message` | Outbound and inbound frames |

// ============================================================================
// Submodules
// ============================================================================

/// Originator commands and agent roles.
pub mod command;

/// Outbound and inbound wire frames.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{
    ACTION_QUERY, ACTION_REGISTERING, ACTION_RESET, Command, RECOVERY_PROMPT, Role,
};
pub use message::{ACTION_HEARTBEAT, InboundMessage, OutboundMessage, heartbeat_frame};
