//! In-memory collaborators for tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::identifiers::TabId;

use super::{Delivery, Environment, Injector};

/// Host browser stand-in with a settable list of live tabs.
#[derive(Default)]
pub(crate) struct MockEnvironment {
    live: Mutex<Vec<TabId>>,
    focused: Mutex<Vec<TabId>>,
    originators: Mutex<Vec<TabId>>,
    queries: AtomicUsize,
    fail_focus: bool,
}

impl MockEnvironment {
    pub(crate) fn with_tabs(tabs: impl IntoIterator<Item = TabId>) -> Self {
        Self {
            live: Mutex::new(tabs.into_iter().collect()),
            ..Self::default()
        }
    }

    pub(crate) fn failing_focus(mut self) -> Self {
        self.fail_focus = true;
        self
    }

    pub(crate) fn set_tabs(&self, tabs: &[TabId]) {
        *self.live.lock() = tabs.to_vec();
    }

    pub(crate) fn focused(&self) -> Vec<TabId> {
        self.focused.lock().clone()
    }

    pub(crate) fn originators(&self) -> Vec<TabId> {
        self.originators.lock().clone()
    }

    pub(crate) fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Environment for MockEnvironment {
    async fn live_destinations(&self) -> Result<Vec<TabId>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.live.lock().clone())
    }

    async fn focus(&self, tab_id: TabId) -> Result<()> {
        if self.fail_focus {
            return Err(Error::environment("focus refused"));
        }
        self.focused.lock().push(tab_id);
        Ok(())
    }

    async fn open_originator(&self, tab_id: TabId) -> Result<()> {
        self.originators.lock().push(tab_id);
        Ok(())
    }
}

/// Injector stand-in that records what it was asked to do.
#[derive(Default)]
pub(crate) struct MockInjector {
    prepared: Mutex<Vec<TabId>>,
    deliveries: Mutex<Vec<(TabId, String)>>,
    no_input: bool,
}

impl MockInjector {
    pub(crate) fn without_input() -> Self {
        Self {
            no_input: true,
            ..Self::default()
        }
    }

    pub(crate) fn prepared(&self) -> Vec<TabId> {
        self.prepared.lock().clone()
    }

    pub(crate) fn deliveries(&self) -> Vec<(TabId, String)> {
        self.deliveries.lock().clone()
    }
}

#[async_trait]
impl Injector for MockInjector {
    async fn prepare(&self, tab_id: TabId) -> Result<()> {
        self.prepared.lock().push(tab_id);
        Ok(())
    }

    async fn deliver(&self, tab_id: TabId, payload: &str) -> Result<Delivery> {
        if self.no_input {
            return Ok(Delivery::InputNotFound);
        }
        self.deliveries.lock().push((tab_id, payload.to_string()));
        Ok(Delivery::Delivered)
    }
}
