//! Inbound routing.
//!
//! Each inbound frame goes through three steps:
//!
//! 1. Parse as `{tab_id, message}`. Failure → [`Error::MalformedPayload`].
//! 2. Resolve `tab_id` against the host browser's live tabs, queried fresh
//!    for every message. No match → [`Error::DestinationNotFound`].
//! 3. Focus the tab and hand the message to the [`Injector`].
//!
//! Nothing is acknowledged to the control process.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::{Destination, TabId};
use crate::protocol::InboundMessage;

use super::{Delivery, Environment, Injector};

// ============================================================================
// MessageRouter
// ============================================================================

/// Dispatches inbound frames to tabs.
#[derive(Debug, Default)]
pub struct MessageRouter {
    /// Messages handed to the injector successfully.
    delivered: u64,
    /// Messages dropped for any reason.
    dropped: u64,
}

impl MessageRouter {
    /// Creates a router.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes one inbound frame.
    ///
    /// Returns the tab the message was delivered to.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedPayload`] if the frame does not parse
    /// - [`Error::DestinationNotFound`] if no live tab matches `tab_id`
    /// - [`Error::InputNotFound`] if the injector found no input surface
    /// - [`Error::Environment`] or any injector error, passed through
    pub async fn on_inbound<E, I>(
        &mut self,
        raw: &str,
        environment: &E,
        injector: &I,
    ) -> Result<TabId>
    where
        E: Environment + ?Sized,
        I: Injector + ?Sized,
    {
        let result = Self::route(raw, environment, injector).await;

        match result {
            Ok(_) => self.delivered += 1,
            Err(_) => self.dropped += 1,
        }

        result
    }

    async fn route<E, I>(raw: &str, environment: &E, injector: &I) -> Result<TabId>
    where
        E: Environment + ?Sized,
        I: Injector + ?Sized,
    {
        let message = InboundMessage::parse(raw)?;

        let tab_id = match message.tab_id {
            Some(Destination::Tab(tab_id)) => tab_id,
            Some(Destination::Popup) | None => {
                return Err(Error::destination_not_found(message.address()));
            }
        };

        let live = environment.live_destinations().await?;
        if !live.contains(&tab_id) {
            return Err(Error::destination_not_found(tab_id.to_string()));
        }

        if let Err(e) = environment.focus(tab_id).await {
            warn!(%tab_id, error = %e, "Failed to focus destination");
        }

        match injector.deliver(tab_id, &message.message).await? {
            Delivery::Delivered => {
                debug!(%tab_id, len = message.message.len(), "Message delivered");
                Ok(tab_id)
            }
            Delivery::InputNotFound => Err(Error::input_not_found(tab_id)),
        }
    }

    /// Returns the number of delivered messages.
    #[inline]
    #[must_use]
    pub fn delivered_count(&self) -> u64 {
        self.delivered
    }

    /// Returns the number of dropped messages.
    #[inline]
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

// ============================================================================
// Tests
// ============================================================================
