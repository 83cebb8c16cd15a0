use thiserror::Error;

pub mod client;
pub mod server;
pub mod snapshot;

pub use client::{ClientMessage, decode_client_message};
pub use server::{ServerMessage, encode_server_message};
pub use snapshot::{BattleOutcome, BattleSnapshot, BattleStatus, FighterView, Side};

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid message format: {0}")]
    Malformed(String),

    #[error("Failed to encode message: {0}")]
    Encode(String),
}
