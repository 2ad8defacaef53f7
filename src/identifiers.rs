//! Type-safe identifiers for relay entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time.
//!
//! | Type | Wire form | Source |
//! |------|-----------|--------|
//! | [`TabId`] | non-zero integer | Host browser |
//! | [`Destination`] | integer or `"popup"` | Target tracker |
//! | [`CorrelationId`] | UUIDv4 string | Outbound encoder |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU32;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

// ============================================================================
// Constants
// ============================================================================

/// Wire spelling of the "no active destination" sentinel.
pub const POPUP: &str = "popup";

// ============================================================================
// TabId
// ============================================================================

/// Identifier of a browser tab.
///
/// Browsers never hand out tab id 0, so the wrapper rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(NonZeroU32);

impl TabId {
    /// Creates a tab id, returning `None` for zero.
    #[inline]
    #[must_use]
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Destination
// ============================================================================

/// Where a message is addressed: a tab, or the popup sentinel.
///
/// [`Destination::Popup`] means "no active destination". It is what the
/// encoder stamps when no tab is tracked, and it never resolves to a live
/// tab on the inbound side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Destination {
    /// A concrete browser tab.
    Tab(TabId),
    /// No active destination.
    #[default]
    Popup,
}

impl Destination {
    /// Returns the tab id, if any.
    #[inline]
    #[must_use]
    pub const fn tab_id(self) -> Option<TabId> {
        match self {
            Self::Tab(id) => Some(id),
            Self::Popup => None,
        }
    }

    /// Returns `true` for the popup sentinel.
    #[inline]
    #[must_use]
    pub const fn is_popup(self) -> bool {
        matches!(self, Self::Popup)
    }
}

impl From<TabId> for Destination {
    #[inline]
    fn from(id: TabId) -> Self {
        Self::Tab(id)
    }
}

impl From<Option<TabId>> for Destination {
    #[inline]
    fn from(id: Option<TabId>) -> Self {
        id.map_or(Self::Popup, Self::Tab)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tab(id) => write!(f, "{id}"),
            Self::Popup => f.write_str(POPUP),
        }
    }
}

impl Serialize for Destination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Tab(id) => serializer.serialize_u32(id.as_u32()),
            Self::Popup => serializer.serialize_str(POPUP),
        }
    }
}

impl<'de> Deserialize<'de> for Destination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DestinationVisitor)
    }
}

#[derive(Clone, Copy)]
struct DestinationVisitor;

impl Visitor<'_> for DestinationVisitor {
    type Value = Destination;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a non-zero tab id or \"{POPUP}\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        u32::try_from(v)
            .ok()
            .and_then(TabId::new)
            .map(Destination::Tab)
            .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            .and_then(|v| self.visit_u64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if v == POPUP {
            Ok(Destination::Popup)
        } else {
            Err(E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }
}

// ============================================================================
// CorrelationId
// ============================================================================

/// Per-message identifier the control process uses to match traffic.
///
/// Always a random version 4 UUID. Collisions are possible in principle
/// and are not treated as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a fresh random id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_tab_id_rejects_zero() {
        assert!(TabId::new(0).is_none());
        assert_eq!(TabId::new(42).map(TabId::as_u32), Some(42));
    }

    #[test]
    fn test_destination_wire_form() {
        let tab = Destination::Tab(TabId::new(17).expect("valid tab id"));

        assert_eq!(serde_json::to_value(tab).expect("serialize"), json!(17));
        assert_eq!(
            serde_json::to_value(Destination::Popup).expect("serialize"),
            json!("popup")
        );
    }

    #[test]
    fn test_destination_parse() {
        let tab: Destination = serde_json::from_value(json!(5)).expect("parse");
        assert_eq!(tab.tab_id().map(TabId::as_u32), Some(5));

        let popup: Destination = serde_json::from_value(json!("popup")).expect("parse");
        assert!(popup.is_popup());
    }

    #[test]
    fn test_destination_parse_rejects_garbage() {
        assert!(serde_json::from_value::<Destination>(json!(0)).is_err());
        assert!(serde_json::from_value::<Destination>(json!(-3)).is_err());
        assert!(serde_json::from_value::<Destination>(json!("tab-9")).is_err());
        assert!(serde_json::from_value::<Destination>(json!(u64::MAX)).is_err());
    }

    #[test]
    fn test_destination_from_option() {
        assert!(Destination::from(None).is_popup());
        let id = TabId::new(3).expect("valid tab id");
        assert_eq!(Destination::from(Some(id)), Destination::Tab(id));
    }

    #[test]
    fn test_correlation_id_format() {
        let id = CorrelationId::generate().to_string();
        assert_eq!(id.len(), 36);
        assert_eq!(id.as_bytes()[14], b'4');
        assert!(matches!(id.as_bytes()[19], b'8' | b'9' | b'a' | b'b'));
    }
}
