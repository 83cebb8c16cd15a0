use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Messages a client may send to the server.
///
/// Wire shape: `{"type": "join", "payload": {"username": "..."}}`.
/// Unknown tags and unparseable payloads fail decoding; the server reports
/// them as malformed input and keeps the connection open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Register for matchmaking, optionally with a display name.
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default)]
        username: Option<String>,
    },

    /// Submit a turn action for the sender's active battle.
    #[serde(rename_all = "camelCase")]
    Action { technique_id: String },

    /// Select a character for the sender's battle, if any.
    #[serde(rename_all = "camelCase")]
    Character { character_id: String },
}

/// Decode a raw text frame into a [`ClientMessage`].
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, ProtocolError> {
    serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))
}
