//! The wire contract toward clients: every broadcast is an [`Envelope`],
//! every inbound frame is a [`ClientCommand`].

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Event names as they appear on the wire.
pub mod events {
    pub const INSERTED: &str = "smc-inserted";
    pub const DATA: &str = "smc-data";
    pub const ERROR: &str = "smc-error";
    pub const REMOVED: &str = "smc-removed";
    pub const INCORRECT: &str = "smc-incorrect";
}

/// A message broadcast to every connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub status: u16,
    pub description: String,
    pub data: Value,
}

impl Envelope {
    fn notice(
        event: &str,
        status: u16,
        description: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event: event.to_string(),
            status,
            description: description.to_string(),
            data: json!({ "message": message.into() }),
        }
    }

    /// A card was inserted; announced before the read starts.
    pub fn inserted(message: impl Into<String>) -> Self {
        Self::notice(events::INSERTED, 202, "Card Inserted", message)
    }

    /// A read completed; `payload` is whatever the read capability produced.
    pub fn data(payload: Value) -> Self {
        Self {
            event: events::DATA.to_string(),
            status: 200,
            description: "Success".to_string(),
            data: payload,
        }
    }

    /// A read failed; `message` carries the "Exception: ..." detail.
    pub fn read_error(message: impl Into<String>) -> Self {
        Self::notice(events::ERROR, 500, "Error", message)
    }

    pub fn removed(message: impl Into<String>) -> Self {
        Self::notice(events::REMOVED, 205, "Card Removed", message)
    }

    pub fn incorrect(message: impl Into<String>) -> Self {
        Self::notice(events::INCORRECT, 400, "Incorrect card input", message)
    }

    /// Device deactivated or reader source failed. Same wire shape for
    /// both; the log line is what tells them apart.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::notice(events::ERROR, 404, "Not Found Smartcard Device", message)
    }
}

/// Commands a client may send over the channel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientCommand {
    SetQuery {
        #[serde(default)]
        data: SetQueryPayload,
    },
    SetAllQuery,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SetQueryPayload {
    #[serde(default)]
    pub query: Option<String>,
}
