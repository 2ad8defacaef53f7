//! Wire frames exchanged with the control process.
//!
//! # Outbound
//!
//! ```json
//! { "action": "Heartbeat" }
//! { "action": "Registering", "role": "Hero Creator", "uuid": "...", "tabId": "popup" }
//! ```
//!
//! # Inbound
//!
//! ```json
//! { "tab_id": 42, "message": "Shall we play a game?" }
//! ```
//!
//! The inbound field is spelled `tab_id`, the outbound one `tabId`. Both
//! spellings are what the control process speaks.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::identifiers::{CorrelationId, Destination};

use super::Command;

// ============================================================================
// Constants
// ============================================================================

/// Action tag of the liveness probe.
pub const ACTION_HEARTBEAT: &str = "Heartbeat";

// ============================================================================
// OutboundMessage
// ============================================================================

/// A command stamped with identity metadata, ready for the transport.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    /// Originator command (action + payload).
    #[serde(flatten)]
    pub command: Command,

    /// Fresh per-message correlation id.
    pub uuid: CorrelationId,

    /// Active destination at encode time, or the popup sentinel.
    #[serde(rename = "tabId")]
    pub destination: Destination,
}

impl OutboundMessage {
    /// Stamps `command` with a fresh correlation id and `destination`.
    #[inline]
    #[must_use]
    pub fn new(command: Command, destination: Destination) -> Self {
        Self {
            command,
            uuid: CorrelationId::generate(),
            destination,
        }
    }

    /// Serializes the message into a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Returns the heartbeat frame.
#[inline]
#[must_use]
pub fn heartbeat_frame() -> String {
    json!({ "action": ACTION_HEARTBEAT }).to_string()
}

// ============================================================================
// InboundMessage
// ============================================================================

/// A message from the control process addressed to a tab.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    /// Addressed tab. `None` when the control process sent `null`.
    #[serde(default)]
    pub tab_id: Option<Destination>,

    /// Text to inject into the tab.
    pub message: String,
}

impl InboundMessage {
    /// Parses an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedPayload`] if the frame is not the expected
    /// JSON shape.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::malformed_payload(e.to_string()))
    }

    /// Returns the address as a printable string, for diagnostics.
    #[must_use]
    pub fn address(&self) -> String {
        self.tab_id
            .map_or_else(|| Value::Null.to_string(), |d| d.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
