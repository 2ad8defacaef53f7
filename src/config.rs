//! Relay configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tab_relay::RelayConfig;
//!
//! let config = RelayConfig::new()
//!     .with_endpoint("ws://127.0.0.1:9000")
//!     .with_heartbeat_interval(Duration::from_secs(10));
//!
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Environment
//!
//! [`RelayConfig::from_env`] overrides the defaults with:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TAB_RELAY_ENDPOINT` | `endpoint` |
//! | `TAB_RELAY_HEARTBEAT_SECS` | `heartbeat_interval` |
//! | `TAB_RELAY_CONNECT_TIMEOUT_SECS` | `connect_timeout` |
//! | `TAB_RELAY_TARGET_PREFIX` | `target_url_prefix` |

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Control process endpoint.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8765";

/// Period between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Maximum time to wait for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pages whose tabs become the active target once loaded.
pub const DEFAULT_TARGET_URL_PREFIX: &str = "https://gemini.google.com/";

const ENV_ENDPOINT: &str = "TAB_RELAY_ENDPOINT";
const ENV_HEARTBEAT_SECS: &str = "TAB_RELAY_HEARTBEAT_SECS";
const ENV_CONNECT_TIMEOUT_SECS: &str = "TAB_RELAY_CONNECT_TIMEOUT_SECS";
const ENV_TARGET_PREFIX: &str = "TAB_RELAY_TARGET_PREFIX";

// ============================================================================
// RelayConfig
// ============================================================================

/// Relay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// WebSocket URL of the control process.
    pub endpoint: String,

    /// Period between heartbeats while the connection is open.
    pub heartbeat_interval: Duration,

    /// Maximum time to wait for the connection to open.
    pub connect_timeout: Duration,

    /// URL prefix identifying target tabs.
    pub target_url_prefix: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            target_url_prefix: DEFAULT_TARGET_URL_PREFIX.to_string(),
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl RelayConfig {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from defaults overridden by environment
    /// variables.
    ///
    /// Unparseable numeric values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = env::var(ENV_ENDPOINT) {
            config.endpoint = endpoint;
        }
        if let Some(interval) = secs_from_env(ENV_HEARTBEAT_SECS) {
            config.heartbeat_interval = interval;
        }
        if let Some(timeout) = secs_from_env(ENV_CONNECT_TIMEOUT_SECS) {
            config.connect_timeout = timeout;
        }
        if let Ok(prefix) = env::var(ENV_TARGET_PREFIX) {
            config.target_url_prefix = prefix;
        }

        config
    }
}

fn secs_from_env(key: &str) -> Option<Duration> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Ignoring invalid duration");
            None
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl RelayConfig {
    /// Sets the control process endpoint.
    #[inline]
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the heartbeat period.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the URL prefix identifying target tabs.
    #[inline]
    #[must_use]
    pub fn with_target_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.target_url_prefix = prefix.into();
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl RelayConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the endpoint is not a `ws`/`wss` URL or
    /// a duration is zero.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::config(format!("Invalid endpoint {}: {e}", self.endpoint)))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "Endpoint must use ws:// or wss://, got {}",
                url.scheme()
            )));
        }

        if self.heartbeat_interval.is_zero() {
            return Err(Error::config("Heartbeat interval must be greater than zero"));
        }

        if self.connect_timeout.is_zero() {
            return Err(Error::config("Connect timeout must be greater than zero"));
        }

        Ok(())
    }

    /// Returns `true` if `url` belongs to a target tab.
    #[inline]
    #[must_use]
    pub fn is_target_url(&self, url: &str) -> bool {
        url.starts_with(&self.target_url_prefix)
    }
}

// ============================================================================
// Tests
// ============================================================================
