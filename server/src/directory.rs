//! Connection registry and session directory.
//!
//! Every map lives behind its own mutex and every critical section is a
//! handful of instructions; no network I/O ever happens while a lock is
//! held. Each battle session has its own mutex, so actions on the same
//! match serialize while independent matches run concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use cursebound_battle::{BattleSession, side_index};
use cursebound_protocol::{ServerMessage, Side};

/// Opaque identifier for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(u64);

/// Outbound channel to one connection's writer task.
pub type OutboundSender = mpsc::UnboundedSender<ServerMessage>;

/// Identity attached to a connection after a successful join.
#[derive(Debug, Clone)]
pub struct PlayerMeta {
    pub username: String,
    pub user_id: i64,
    /// Character chosen before pairing; carried into the session at start.
    pub character_id: Option<String>,
}

#[derive(Clone)]
struct Registered {
    sender: OutboundSender,
    player: Option<PlayerMeta>,
}

/// A session plus the two connections it broadcasts to.
#[derive(Clone)]
pub struct SessionEntry {
    pub session: Arc<Mutex<BattleSession>>,
    pub conns: [ConnId; 2],
}

impl SessionEntry {
    /// Which side of the battle a connection occupies, if either.
    pub fn side_of(&self, conn: ConnId) -> Option<Side> {
        if self.conns[0] == conn {
            Some(Side::Player1)
        } else if self.conns[1] == conn {
            Some(Side::Player2)
        } else {
            None
        }
    }

    pub fn conn_of(&self, side: Side) -> ConnId {
        self.conns[side_index(side)]
    }
}

/// Shared registry of live connections and active sessions.
pub struct Directory {
    next_conn_id: AtomicU64,
    connections: Mutex<HashMap<ConnId, Registered>>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    by_conn: Mutex<HashMap<ConnId, String>>,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            next_conn_id: AtomicU64::new(1),
            connections: Mutex::new(HashMap::new()),
            sessions: Mutex::new(HashMap::new()),
            by_conn: Mutex::new(HashMap::new()),
        }
    }

    pub fn allocate_conn(&self) -> ConnId {
        ConnId(self.next_conn_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a freshly accepted connection.
    pub fn connect(&self, conn: ConnId, sender: OutboundSender) {
        if let Ok(mut connections) = self.connections.lock() {
            connections.insert(
                conn,
                Registered {
                    sender,
                    player: None,
                },
            );
        }
    }

    /// Drop all registry state for a connection.
    pub fn disconnect(&self, conn: ConnId) {
        if let Ok(mut connections) = self.connections.lock() {
            connections.remove(&conn);
        }
    }

    /// A connection counts as open while its writer task still drains the
    /// outbound channel.
    pub fn is_open(&self, conn: ConnId) -> bool {
        self.connections
            .lock()
            .ok()
            .and_then(|connections| {
                connections
                    .get(&conn)
                    .map(|registered| !registered.sender.is_closed())
            })
            .unwrap_or(false)
    }

    /// Attach (or replace) the joined identity on a connection.
    pub fn attach_player(&self, conn: ConnId, player: PlayerMeta) {
        if let Ok(mut connections) = self.connections.lock()
            && let Some(registered) = connections.get_mut(&conn)
        {
            registered.player = Some(player);
        }
    }

    pub fn player(&self, conn: ConnId) -> Option<PlayerMeta> {
        self.connections
            .lock()
            .ok()?
            .get(&conn)?
            .player
            .clone()
    }

    /// Record a pre-match character choice.
    pub fn set_character(&self, conn: ConnId, character_id: &str) {
        if let Ok(mut connections) = self.connections.lock()
            && let Some(player) = connections
                .get_mut(&conn)
                .and_then(|registered| registered.player.as_mut())
        {
            player.character_id = Some(character_id.to_string());
        }
    }

    /// Push a message to one connection. A closed or missing connection is
    /// silently skipped, never retried.
    pub fn send(&self, conn: ConnId, message: ServerMessage) {
        let sender = self
            .connections
            .lock()
            .ok()
            .and_then(|connections| connections.get(&conn).map(|r| r.sender.clone()));
        if let Some(sender) = sender {
            let _ = sender.send(message);
        }
    }

    pub fn create_session(&self, match_id: String, entry: SessionEntry) {
        if let Ok(mut by_conn) = self.by_conn.lock() {
            for conn in entry.conns {
                by_conn.insert(conn, match_id.clone());
            }
        }
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(match_id, entry);
        }
    }

    pub fn find_session(&self, conn: ConnId) -> Option<SessionEntry> {
        let match_id = self.by_conn.lock().ok()?.get(&conn).cloned()?;
        self.sessions.lock().ok()?.get(&match_id).cloned()
    }

    /// Remove a concluded session and its connection mappings.
    pub fn remove_session(&self, match_id: &str) {
        let removed = self
            .sessions
            .lock()
            .ok()
            .and_then(|mut sessions| sessions.remove(match_id));
        if let (Some(entry), Ok(mut by_conn)) = (removed, self.by_conn.lock()) {
            for conn in entry.conns {
                by_conn.remove(&conn);
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}
