//! Active target tracking.
//!
//! The tracker holds at most one active tab. A newer ready tab replaces the
//! previous one without waiting for it to go away, and a "gone" notification
//! only clears the target if it names the tab currently held.

use rustc_hash::FxHashSet;
use tracing::{debug, trace};

use crate::identifiers::{Destination, TabId};

// ============================================================================
// TargetTracker
// ============================================================================

/// Owner of the active target.
///
/// Only the relay loop mutates it; encoder and router read it through
/// [`TargetTracker::current`].
#[derive(Debug, Default)]
pub struct TargetTracker {
    /// Active target, if any.
    current: Option<TabId>,
    /// Tabs whose surface has already been prepared.
    prepared: FxHashSet<TabId>,
}

impl TargetTracker {
    /// Creates a tracker with no active target.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `tab_id` the active target.
    ///
    /// Returns `true` the first time `tab_id` becomes ready, meaning its
    /// surface still needs preparing.
    pub fn on_ready(&mut self, tab_id: TabId) -> bool {
        if let Some(previous) = self.current.replace(tab_id)
            && previous != tab_id
        {
            debug!(%previous, current = %tab_id, "Active target superseded");
        } else {
            debug!(current = %tab_id, "Active target set");
        }

        self.prepared.insert(tab_id)
    }

    /// Handles `tab_id` going away.
    ///
    /// Returns `true` if it was the active target and has been cleared.
    pub fn on_gone(&mut self, tab_id: TabId) -> bool {
        self.prepared.remove(&tab_id);

        if self.current == Some(tab_id) {
            self.current = None;
            debug!(%tab_id, "Active target cleared");
            true
        } else {
            trace!(%tab_id, "Ignoring gone for inactive tab");
            false
        }
    }

    /// Returns the active target, or [`Destination::Popup`] when there is none.
    #[inline]
    #[must_use]
    pub fn current(&self) -> Destination {
        Destination::from(self.current)
    }

    /// Returns `true` if `tab_id` has been prepared and not gone since.
    #[inline]
    #[must_use]
    pub fn is_prepared(&self, tab_id: TabId) -> bool {
        self.prepared.contains(&tab_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
