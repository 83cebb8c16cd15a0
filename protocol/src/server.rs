use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::snapshot::BattleSnapshot;

/// Messages the server pushes to clients.
///
/// Same tagged shape as [`crate::ClientMessage`]; the tag namespaces queue
/// and battle lifecycle events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Sent immediately on connect and while waiting for an opponent.
    #[serde(rename = "queue:status")]
    QueueStatus { message: String },

    /// Acknowledges a successful enqueue.
    #[serde(rename = "queue:joined")]
    QueueJoined { username: String },

    /// Sent to both participants the moment pairing succeeds.
    #[serde(rename = "battle:start")]
    BattleStart(BattleSnapshot),

    /// Sent after every accepted action or character selection.
    #[serde(rename = "battle:update")]
    BattleUpdate(BattleSnapshot),

    /// Sent once, at the transition into `finished`; carries the winner.
    #[serde(rename = "battle:end")]
    BattleEnd(BattleSnapshot),

    /// Sent once cleanup finishes; the client may return to matchmaking.
    #[serde(rename = "battle:complete")]
    #[serde(rename_all = "camelCase")]
    BattleComplete { battle_id: String },

    /// Sent for any rejected client message, to the sender only.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Encode a [`ServerMessage`] into a text frame.
pub fn encode_server_message(message: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(message).map_err(|e| ProtocolError::Encode(e.to_string()))
}
