//! Originator command definitions.
//!
//! A [`Command`] is what a trigger surface (popup button, in-page button,
//! clipboard paste) hands to the relay. It carries an action name and a
//! free-form payload; identity metadata is added later by the encoder.
//!
//! # Actions
//!
//! | Action | Payload | Origin |
//! |--------|---------|--------|
//! | `Registering` | `role` | Popup role buttons |
//! | `Reset` | none | Popup reset button |
//! | `Query` | `role`, `query` | Agent replies pasted from the clipboard |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Action tag of the registration command.
pub const ACTION_REGISTERING: &str = "Registering";

/// Action tag of the reset command.
pub const ACTION_RESET: &str = "Reset";

/// Action tag of an agent-to-agent query.
pub const ACTION_QUERY: &str = "Query";

/// Payload keys owned by the relay. Originator values for these are dropped.
pub(crate) const RESERVED_KEYS: [&str; 3] = ["action", "uuid", "tabId"];

/// Recovery prompt injected by the in-page "PANIC!" button.
///
/// Sent to an agent that stopped answering in the expected JSON shape.
pub const RECOVERY_PROMPT: &str = "You failed to follow your initial instructions properly, \
and there was an error. Please review your previous response and compare it with your \
initial instructions. Did you format your JSON properly? Did you generate a proper JSON \
reply? Did you send the correct fields in you JSON response?";

// ============================================================================
// Role
// ============================================================================

/// Agent roles a tab can register as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Orchestrating agent.
    DungeonMaster,
    /// Narrative helper.
    Storyteller,
    /// Builds player characters.
    HeroCreator,
    /// Builds opponents.
    MonsterCreator,
    /// Builds maps.
    MapGenerator,
    /// Runs combat.
    FightManager,
}

impl Role {
    /// All roles, in popup order.
    pub const ALL: [Role; 6] = [
        Role::DungeonMaster,
        Role::Storyteller,
        Role::HeroCreator,
        Role::MonsterCreator,
        Role::MapGenerator,
        Role::FightManager,
    ];

    /// Returns the role name as the control process spells it.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::DungeonMaster => "Dungeon Master",
            Role::Storyteller => "Storyteller",
            Role::HeroCreator => "Hero Creator",
            Role::MonsterCreator => "Monster Creator",
            Role::MapGenerator => "Map Generator",
            Role::FightManager => "Fight Manager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| Error::invalid_argument(format!("Unknown role: {s}")))
    }
}

impl Serialize for Role {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Command
// ============================================================================

/// A command submitted by an originator.
///
/// # Format
///
/// Serializes as the action merged with the payload:
///
/// ```json
/// { "action": "Registering", "role": "Hero Creator" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Command {
    /// Action tag read by the control process.
    action: String,

    /// Originator payload, minus reserved keys.
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Command {
    /// Creates a command from an action and payload.
    ///
    /// Reserved keys (`action`, `uuid`, `tabId`) are removed from the
    /// payload; the relay stamps its own values for them.
    #[must_use]
    pub fn new(action: impl Into<String>, mut payload: Map<String, Value>) -> Self {
        for key in RESERVED_KEYS {
            payload.remove(key);
        }
        Self {
            action: action.into(),
            payload,
        }
    }

    /// Creates a registration command for `role`.
    #[must_use]
    pub fn register(role: Role) -> Self {
        let mut payload = Map::new();
        payload.insert("role".to_string(), Value::from(role.as_str()));
        Self::new(ACTION_REGISTERING, payload)
    }

    /// Creates a reset command.
    #[must_use]
    pub fn reset() -> Self {
        Self::new(ACTION_RESET, Map::new())
    }

    /// Creates a query addressed to every tab registered as `role`.
    #[must_use]
    pub fn query(role: Role, query: impl Into<String>) -> Self {
        let mut payload = Map::new();
        payload.insert("role".to_string(), Value::from(role.as_str()));
        payload.insert("query".to_string(), Value::String(query.into()));
        Self::new(ACTION_QUERY, payload)
    }

    /// Parses a command from JSON text, e.g. an agent reply on the clipboard.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not JSON
    /// - [`Error::InvalidArgument`] if it is not an object with a string `action`
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Builds a command from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the value is not an object
    /// with a string `action`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut payload) = value else {
            return Err(Error::invalid_argument("Command must be a JSON object"));
        };

        let action = match payload.remove("action") {
            Some(Value::String(action)) if !action.is_empty() => action,
            Some(_) => return Err(Error::invalid_argument("Command action must be a string")),
            None => return Err(Error::invalid_argument("Command is missing an action")),
        };

        Ok(Self::new(action, payload))
    }

    /// Returns the action tag.
    #[inline]
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

// ============================================================================
// Tests
// ============================================================================
