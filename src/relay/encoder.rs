//! Outbound encoding.
//!
//! Turns originator commands into [`OutboundMessage`]s and hands them to
//! the connection manager. The destination is read from the tracker when
//! the command is encoded, so a target change between submission and send
//! is always reflected.

use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::CorrelationId;
use crate::protocol::{Command, OutboundMessage};
use crate::transport::ConnectionManager;

use super::TargetTracker;

// ============================================================================
// OutboundEncoder
// ============================================================================

/// Stamps commands with a correlation id and destination.
#[derive(Debug, Default)]
pub struct OutboundEncoder {
    /// Messages handed to the transport and not reported unsent.
    sent: u64,
    /// Messages dropped because the transport was not open or closed first.
    dropped: u64,
}

impl OutboundEncoder {
    /// Creates an encoder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `command` for the tracker's current destination.
    #[must_use]
    pub fn encode(&self, command: Command, tracker: &TargetTracker) -> OutboundMessage {
        OutboundMessage::new(command, tracker.current())
    }

    /// Encodes `command` and sends it.
    ///
    /// There is no outbound buffer: a message that cannot be sent is gone.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the transport is not open
    /// - [`Error::Json`] if the message cannot be serialized
    pub fn send(
        &mut self,
        command: Command,
        tracker: &TargetTracker,
        connection: &ConnectionManager,
    ) -> Result<CorrelationId> {
        let message = self.encode(command, tracker);
        let frame = message.to_frame()?;

        match connection.send(frame) {
            Ok(()) => {
                self.sent += 1;
                trace!(
                    uuid = %message.uuid,
                    action = message.command.action(),
                    tab_id = %message.destination,
                    "Command sent"
                );
                Ok(message.uuid)
            }
            Err(e) => {
                self.dropped += 1;
                warn!(
                    uuid = %message.uuid,
                    action = message.command.action(),
                    error = %e,
                    "Dropping outbound command"
                );
                Err(e)
            }
        }
    }

    /// Moves `count` messages from sent to dropped.
    ///
    /// Used when the transport ends with frames it accepted but never wrote.
    pub fn record_unsent(&mut self, count: usize) {
        let count = (count as u64).min(self.sent);
        self.sent -= count;
        self.dropped += count;
    }

    /// Returns the number of messages handed to the transport.
    #[inline]
    #[must_use]
    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    /// Returns the number of messages dropped.
    #[inline]
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use rustc_hash::FxHashSet;
    use serde_json::Value;

    use crate::config::RelayConfig;
    use crate::identifiers::{Destination, TabId};
    use crate::protocol::Role;
    use crate::transport::test_server::TestServer;

    fn tab(id: u32) -> TabId {
        TabId::new(id).expect("valid tab id")
    }

    fn is_uuid_v4(s: &str) -> bool {
        let groups: Vec<&str> = s.split('-').collect();
        let lengths: Vec<usize> = groups.iter().map(|g| g.len()).collect();

        s.len() == 36
            && lengths == [8, 4, 4, 4, 12]
            && s.chars().all(|c| c == '-' || c.is_ascii_hexdigit())
            && groups[2].starts_with('4')
            && groups[3].starts_with(['8', '9', 'a', 'b'])
    }

    #[test]
    fn test_encode_without_target_uses_popup() {
        let encoder = OutboundEncoder::new();
        let tracker = TargetTracker::new();

        let message = encoder.encode(Command::register(Role::HeroCreator), &tracker);

        assert_eq!(message.destination, Destination::Popup);
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value["tabId"], "popup");
        assert_eq!(value["role"], "Hero Creator");
    }

    #[test]
    fn test_destination_resolved_at_encode_time() {
        let encoder = OutboundEncoder::new();
        let mut tracker = TargetTracker::new();
        let command = Command::reset();

        tracker.on_ready(tab(1));
        assert_eq!(
            encoder.encode(command.clone(), &tracker).destination,
            Destination::Tab(tab(1))
        );

        tracker.on_gone(tab(1));
        assert_eq!(encoder.encode(command, &tracker).destination, Destination::Popup);
    }

    #[test]
    fn test_correlation_ids_unique() {
        let encoder = OutboundEncoder::new();
        let tracker = TargetTracker::new();

        let ids: FxHashSet<String> = (0..10_000)
            .map(|_| encoder.encode(Command::reset(), &tracker).uuid.to_string())
            .collect();

        assert_eq!(ids.len(), 10_000);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_dropped() {
        let mut encoder = OutboundEncoder::new();
        let tracker = TargetTracker::new();
        let connection = ConnectionManager::new(&RelayConfig::default());

        let result = encoder.send(Command::reset(), &tracker, &connection);

        assert!(matches!(result, Err(Error::NotConnected)));
        assert_eq!(encoder.sent_count(), 0);
        assert_eq!(encoder.dropped_count(), 1);
    }

    #[tokio::test]
    async fn test_send_while_open() {
        let mut server = TestServer::start().await;
        let config = RelayConfig::new().with_endpoint(server.url());
        let connection = ConnectionManager::new(&config);
        let _events = connection.open().await.expect("open");

        let mut encoder = OutboundEncoder::new();
        let mut tracker = TargetTracker::new();
        tracker.on_ready(tab(33));

        let uuid = encoder
            .send(Command::register(Role::MapGenerator), &tracker, &connection)
            .expect("send");

        let frame = server.next_command().await.expect("command frame");
        let value: Value = serde_json::from_str(&frame).expect("json");
        assert_eq!(value["action"], "Registering");
        assert_eq!(value["tabId"], 33);
        assert_eq!(value["uuid"], uuid.to_string());
        assert_eq!(encoder.sent_count(), 1);

        connection.close();
    }

    proptest! {
        #[test]
        fn prop_correlation_id_is_uuid_v4(ready in proptest::option::of(1u32..10_000)) {
            let encoder = OutboundEncoder::new();
            let mut tracker = TargetTracker::new();
            if let Some(id) = ready {
                tracker.on_ready(tab(id));
            }

            let message = encoder.encode(Command::reset(), &tracker);
            prop_assert!(is_uuid_v4(&message.uuid.to_string()));
        }
    }

    #[test]
    fn test_record_unsent_moves_counts() {
        let mut encoder = OutboundEncoder {
            sent: 3,
            dropped: 1,
        };

        encoder.record_unsent(2);
        assert_eq!(encoder.sent_count(), 1);
        assert_eq!(encoder.dropped_count(), 3);

        encoder.record_unsent(5);
        assert_eq!(encoder.sent_count(), 0);
        assert_eq!(encoder.dropped_count(), 4);
    }
}
