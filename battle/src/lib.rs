//! Battle session state machine and technique catalog for Cursebound.
//!
//! This crate owns the authoritative rules of a single match and is free of
//! any I/O: the server crate drives it from connection tasks and handles
//! broadcasting and persistence.
//!
//! ```text
//! cursebound-protocol (wire format)
//!        │
//!        ▼
//! cursebound-battle (rules + session state) ← THIS CRATE
//!        │
//!        └─> cursebound-server (matchmaking, routing, persistence)
//! ```
//!
//! # Main Types
//!
//! - [`Technique`] - a fixed-power offensive action from the read-only catalog
//! - [`Fighter`] - one participant as owned by a session
//! - [`BattleSession`] - authoritative state of one match, with the
//!   action-resolution and termination logic
//!
//! Randomness is injected: every mutating roll takes `&mut impl Rng`, so
//! tests drive fully deterministic scenarios.

pub mod catalog;
pub mod session;

pub use catalog::{TECHNIQUES, Technique, technique};
pub use session::{
    ActionReport, BattleSession, Fighter, LOG_CAPACITY, MAX_HEALTH, STARTING_THREAT, SessionError,
    THREAT_CEILING, side_index,
};

// Re-export the protocol types the session speaks in.
pub use cursebound_protocol::{BattleOutcome, BattleSnapshot, BattleStatus, Side};
