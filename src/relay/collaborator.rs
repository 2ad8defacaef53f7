//! Capabilities the relay consumes from the host browser.
//!
//! | Trait / Type | Role |
//! |--------------|------|
//! | [`Environment`] | Lists live tabs, focuses a tab, opens the role picker |
//! | [`Injector`] | Prepares a tab surface, injects text and submits it |
//! | [`TabEvent`] | Tab lifecycle notifications fed into the relay |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::identifiers::TabId;

// ============================================================================
// Environment
// ============================================================================

/// The host browser.
#[async_trait]
pub trait Environment: Send + Sync {
    /// Returns the tabs that can currently receive a delivery.
    ///
    /// Implementations typically list every tab showing a target page,
    /// whether or not it is the active target.
    async fn live_destinations(&self) -> Result<Vec<TabId>>;

    /// Brings `tab_id` to the foreground.
    async fn focus(&self, tab_id: TabId) -> Result<()>;

    /// Shows the originator surface (the role picker) for a ready tab.
    ///
    /// Called every time `tab_id` finishes loading a target page. Hosts
    /// without such a surface keep the default, which does nothing.
    async fn open_originator(&self, _tab_id: TabId) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Injector
// ============================================================================

/// Outcome of [`Injector::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The payload was written and submitted.
    Delivered,
    /// The tab has no input surface to write into.
    InputNotFound,
}

/// Content-side capability that writes into a tab.
///
/// How the input field is located is up to the implementation.
#[async_trait]
pub trait Injector: Send + Sync {
    /// Prepares a freshly ready tab, e.g. by adding trigger buttons.
    ///
    /// Called once per tab id while it stays live.
    async fn prepare(&self, tab_id: TabId) -> Result<()>;

    /// Writes `payload` into the tab's input field and submits it.
    async fn deliver(&self, tab_id: TabId, payload: &str) -> Result<Delivery>;
}

// ============================================================================
// TabEvent
// ============================================================================

/// Load status reported with a tab update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    /// Page is loading.
    Loading,
    /// Page finished loading.
    Complete,
}

/// Tab lifecycle notification from the host browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabEvent {
    /// A tab changed status or url.
    Updated {
        /// Tab that changed.
        tab_id: TabId,
        /// Current load status.
        status: TabStatus,
        /// Current url.
        url: String,
    },
    /// A tab was closed.
    Removed {
        /// Tab that was closed.
        tab_id: TabId,
    },
}

impl TabEvent {
    /// Shorthand for a completed load of `url` in `tab_id`.
    #[inline]
    #[must_use]
    pub fn loaded(tab_id: TabId, url: impl Into<String>) -> Self {
        Self::Updated {
            tab_id,
            status: TabStatus::Complete,
            url: url.into(),
        }
    }

    /// Shorthand for a closed tab.
    #[inline]
    #[must_use]
    pub fn removed(tab_id: TabId) -> Self {
        Self::Removed { tab_id }
    }

    /// Returns the tab the event is about.
    #[inline]
    #[must_use]
    pub fn tab_id(&self) -> TabId {
        match self {
            Self::Updated { tab_id, .. } | Self::Removed { tab_id } => *tab_id,
        }
    }
}
