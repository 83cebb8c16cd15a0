//! Matchmaking and battle-session coordinator for Cursebound.
//!
//! One tokio task drives each live websocket connection; the tasks share a
//! [`hub::Hub`] that owns the matchmaking queue, the session directory, and
//! the user store seam. State mutation always happens under a lock and
//! broadcasts always happen after the lock is released.

pub mod config;
pub mod connection;
pub mod directory;
pub mod hub;
pub mod queue;
pub mod store;

pub use config::ServerConfig;
pub use directory::ConnId;
pub use hub::Hub;
pub use store::{MemoryStore, OutcomeRecord, UserRecord, UserStore};
