//! Error types for the tab relay.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use tab_relay::{Command, Result};
//!
//! fn example(handle: &RelayHandle) -> Result<()> {
//!     handle.submit(Command::reset())?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Connection | [`Error::NotConnected`], [`Error::Connection`], [`Error::ConnectionTimeout`] |
//! | Routing | [`Error::MalformedPayload`], [`Error::DestinationNotFound`], [`Error::InputNotFound`] |
//! | Collaborators | [`Error::Environment`], [`Error::RelayClosed`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |
//!
//! Every error is terminal at the point it occurs. The relay reports it and
//! drops the affected message; nothing is retried.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::TabId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when relay configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid originator command.
    ///
    /// Returned when a command cannot be built from the supplied input.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Send attempted while the transport is not open.
    ///
    /// The message is dropped. There is no outbound queue.
    #[error("Not connected")]
    NotConnected,

    /// WebSocket connection failed.
    ///
    /// Returned when the connection to the control process cannot be
    /// established, or when opening an already open connection.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt timed out.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Routing Errors
    // ========================================================================
    /// Inbound frame does not have the expected structure.
    #[error("Malformed payload: {message}")]
    MalformedPayload {
        /// Parser error message.
        message: String,
    },

    /// Inbound message addressed to no live destination.
    #[error("Destination not found: {destination}")]
    DestinationNotFound {
        /// The address as it appeared on the wire.
        destination: String,
    },

    /// The injector found no input surface in the destination.
    #[error("Input surface not found in tab {tab_id}")]
    InputNotFound {
        /// Tab the delivery was attempted in.
        tab_id: TabId,
    },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// Host browser query failed.
    #[error("Environment error: {message}")]
    Environment {
        /// Description of the failure.
        message: String,
    },

    /// The relay event loop is no longer running.
    #[error("Relay closed")]
    RelayClosed,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket fault.
    ///
    /// Raised by reads and writes on an open socket. The connection is
    /// terminated and not re-opened.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a malformed payload error.
    #[inline]
    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            message: message.into(),
        }
    }

    /// Creates a destination not found error.
    #[inline]
    pub fn destination_not_found(destination: impl Into<String>) -> Self {
        Self::DestinationNotFound {
            destination: destination.into(),
        }
    }

    /// Creates an input not found error.
    #[inline]
    pub fn input_not_found(tab_id: TabId) -> Self {
        Self::InputNotFound { tab_id }
    }

    /// Creates an environment error.
    #[inline]
    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error came from routing an inbound message.
    #[inline]
    #[must_use]
    pub fn is_routing_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedPayload { .. }
                | Self::DestinationNotFound { .. }
                | Self::InputNotFound { .. }
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors leave the relay running; only the affected
    /// message is lost.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::MalformedPayload { .. }
                | Self::DestinationNotFound { .. }
                | Self::InputNotFound { .. }
                | Self::Environment { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::connection("refused");
        assert_eq!(err.to_string(), "Connection failed: refused");
        assert_eq!(Error::NotConnected.to_string(), "Not connected");
    }

    #[test]
    fn test_destination_not_found_display() {
        let err = Error::destination_not_found("popup");
        assert_eq!(err.to_string(), "Destination not found: popup");
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::NotConnected.is_connection_error());
        assert!(Error::from(WsError::ConnectionClosed).is_connection_error());
        assert!(Error::connection_timeout(1000).is_connection_error());
        assert!(!Error::malformed_payload("eof").is_connection_error());
    }

    #[test]
    fn test_is_routing_error() {
        let tab = TabId::new(7).expect("valid tab id");

        assert!(Error::malformed_payload("eof").is_routing_error());
        assert!(Error::destination_not_found("7").is_routing_error());
        assert!(Error::input_not_found(tab).is_routing_error());
        assert!(!Error::NotConnected.is_routing_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::NotConnected.is_recoverable());
        assert!(Error::destination_not_found("x").is_recoverable());
        assert!(!Error::from(WsError::AlreadyClosed).is_recoverable());
        assert!(!Error::config("bad").is_recoverable());
    }

    #[test]
    fn test_from_websocket_error() {
        let err: Error = WsError::ConnectionClosed.into();
        assert!(matches!(err, Error::WebSocket(_)));
        assert!(err.to_string().starts_with("WebSocket error"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
