//! The coordinator shared by every connection task.
//!
//! The hub owns the matchmaking queue, the connection/session directory,
//! and the user-store seam. Handlers mutate state under the relevant lock,
//! release it, and only then push messages out; sends never block because
//! each connection drains its own unbounded channel.

use std::sync::Arc;

use rand::Rng;
use tracing::{error, info, warn};
use uuid::Uuid;

use cursebound_battle::{BattleSession, Fighter, SessionError};
use cursebound_protocol::{BattleOutcome, BattleSnapshot, ServerMessage, Side};

use crate::directory::{ConnId, Directory, OutboundSender, PlayerMeta, SessionEntry};
use crate::queue::MatchQueue;
use crate::store::{OutcomeRecord, UserStore};

const WAITING_MESSAGE: &str = "Waiting for another sorcerer...";
const ALREADY_ENLISTED: &str = "Already enlisted. Await battle start.";
const REGISTER_FAILED: &str = "Failed to register user.";
const NO_ACTIVE_BATTLE: &str = "No active battle found.";
const UNKNOWN_TECHNIQUE: &str = "Unknown technique.";
const STATE_MISMATCH: &str = "Battle state mismatch.";

pub struct Hub {
    directory: Directory,
    queue: MatchQueue,
    store: Arc<dyn UserStore>,
}

impl Hub {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self {
            directory: Directory::new(),
            queue: MatchQueue::new(),
            store,
        }
    }

    pub fn allocate_conn(&self) -> ConnId {
        self.directory.allocate_conn()
    }

    /// Register a freshly accepted connection and greet it.
    pub fn connect(&self, conn: ConnId, sender: OutboundSender) {
        self.directory.connect(conn, sender);
        self.directory.send(
            conn,
            ServerMessage::QueueStatus {
                message: WAITING_MESSAGE.into(),
            },
        );
    }

    /// Push a message to one connection.
    pub fn send(&self, conn: ConnId, message: ServerMessage) {
        self.directory.send(conn, message);
    }

    /// Register for matchmaking. A participant already queued or already in
    /// a session gets an "already enlisted" notice instead; a participant
    /// whose previous battle has completed may join again.
    pub async fn handle_join(&self, conn: ConnId, requested: Option<String>) {
        if self.queue.contains(conn) || self.directory.find_session(conn).is_some() {
            self.directory.send(
                conn,
                ServerMessage::QueueStatus {
                    message: ALREADY_ENLISTED.into(),
                },
            );
            return;
        }

        let username = sanitize_username(requested.as_deref().unwrap_or(""));
        let record = match self.store.find_or_create(&username).await {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, username = %username, "failed to resolve user");
                self.send_error(conn, REGISTER_FAILED);
                return;
            }
        };

        self.directory.attach_player(
            conn,
            PlayerMeta {
                username: record.username.clone(),
                user_id: record.id,
                character_id: None,
            },
        );
        self.queue.enqueue(conn);
        self.directory.send(
            conn,
            ServerMessage::QueueJoined {
                username: record.username,
            },
        );
        self.pair_waiting().await;
    }

    /// Select a character: recorded on the session if one is running
    /// (broadcasting an update), otherwise remembered for the next pairing.
    pub fn handle_character(&self, conn: ConnId, character_id: &str) {
        if character_id.is_empty() {
            return;
        }

        let Some(entry) = self.directory.find_session(conn) else {
            self.directory.set_character(conn, character_id);
            return;
        };
        let Some(side) = entry.side_of(conn) else {
            return;
        };

        let applied = match entry.session.lock() {
            Ok(mut session) => session.select_character(side, character_id).is_ok(),
            Err(_) => false,
        };
        if applied {
            self.broadcast(&entry, ServerMessage::BattleUpdate);
        }
    }

    /// Submit a turn action. Protocol violations are reported to the sender
    /// only; an accepted action is broadcast to both participants, and a
    /// terminal action triggers settlement.
    pub async fn handle_action(&self, conn: ConnId, technique_id: &str) {
        let Some(entry) = self.directory.find_session(conn) else {
            self.send_error(conn, NO_ACTIVE_BATTLE);
            return;
        };
        let Some(side) = entry.side_of(conn) else {
            self.send_error(conn, STATE_MISMATCH);
            return;
        };

        let result = match entry.session.lock() {
            Ok(mut session) => session.apply_action(side, technique_id, &mut rand::thread_rng()),
            Err(_) => {
                self.send_error(conn, STATE_MISMATCH);
                return;
            }
        };

        match result {
            Ok(report) => {
                self.broadcast(&entry, ServerMessage::BattleUpdate);
                if report.finished {
                    self.settle(&entry).await;
                }
            }
            Err(SessionError::NotActive) => self.send_error(conn, NO_ACTIVE_BATTLE),
            Err(SessionError::UnknownTechnique(_)) => self.send_error(conn, UNKNOWN_TECHNIQUE),
        }
    }

    /// Disconnect is a first-class lifecycle event: the participant leaves
    /// the queue and registry, and an active session is forfeited in favor
    /// of the opponent.
    pub async fn handle_disconnect(&self, conn: ConnId) {
        self.queue.remove(conn);
        self.directory.disconnect(conn);

        let Some(entry) = self.directory.find_session(conn) else {
            return;
        };
        let Some(side) = entry.side_of(conn) else {
            return;
        };

        let forfeited = match entry.session.lock() {
            Ok(mut session) => session.forfeit(side).is_ok(),
            Err(_) => false,
        };
        if forfeited {
            info!("participant disconnected mid-battle, awarding forfeit victory");
            self.settle(&entry).await;
        }
    }

    async fn pair_waiting(&self) {
        // A pairing can abort and return its survivor to the queue, so keep
        // retrying until a pass produces no pairs.
        loop {
            let pairs = self.queue.try_pair(|conn| self.directory.is_open(conn));
            if pairs.is_empty() {
                return;
            }
            for (first, second) in pairs {
                self.start_battle(first, second).await;
            }
        }
    }

    async fn start_battle(&self, first: ConnId, second: ConnId) {
        let (Some(p1), Some(p2)) = (self.directory.player(first), self.directory.player(second))
        else {
            // A disconnect can land between the queue's liveness check and
            // here, wiping the identity before the battle exists. Return any
            // survivor to the head of the queue so it keeps its priority.
            warn!("paired connection lost its identity before battle start");
            for conn in [first, second] {
                if self.directory.is_open(conn) {
                    self.queue.requeue_front(conn);
                    self.directory.send(
                        conn,
                        ServerMessage::QueueStatus {
                            message: WAITING_MESSAGE.into(),
                        },
                    );
                }
            }
            return;
        };

        let match_id = Uuid::new_v4().to_string();
        let mut fighter1 = Fighter::new(p1.username.clone(), p1.user_id);
        fighter1.character_id = p1.character_id;
        let mut fighter2 = Fighter::new(p2.username.clone(), p2.user_id);
        fighter2.character_id = p2.character_id;

        let session = BattleSession::new(match_id.clone(), fighter1, fighter2);
        let entry = SessionEntry {
            session: Arc::new(std::sync::Mutex::new(session)),
            conns: [first, second],
        };
        self.directory.create_session(match_id.clone(), entry.clone());

        info!(
            battle_id = %match_id,
            player1 = %p1.username,
            player2 = %p2.username,
            "battle started"
        );
        self.broadcast(&entry, ServerMessage::BattleStart);

        // The disconnect can also land after the identity reads, in which
        // case its handler saw no session to forfeit. Re-check both sides
        // now that the session is registered and award the forfeit here, so
        // the opponent is never left in a battle nobody can end.
        for side in [Side::Player1, Side::Player2] {
            if self.directory.is_open(entry.conn_of(side)) {
                continue;
            }
            let forfeited = match entry.session.lock() {
                Ok(mut session) => session.forfeit(side).is_ok(),
                Err(_) => false,
            };
            if forfeited {
                info!(
                    battle_id = %match_id,
                    "participant vanished during pairing, awarding forfeit victory"
                );
                self.settle(&entry).await;
            }
        }
    }

    /// Terminal persistence and cleanup, run exactly once per match: the
    /// callers only reach this on the single Active → Finished transition.
    /// A storage fault is logged and swallowed so the players are never
    /// left waiting on an unavailable store.
    async fn settle(&self, entry: &SessionEntry) {
        let Some(record) = self.build_outcome(entry) else {
            return;
        };

        if let Err(e) = self.store.record_outcome(&record).await {
            error!(
                error = %e,
                battle_id = %record.battle_id,
                "failed to persist battle outcome"
            );
        }

        self.broadcast(entry, ServerMessage::BattleEnd);
        for side in [Side::Player1, Side::Player2] {
            self.directory.send(
                entry.conn_of(side),
                ServerMessage::BattleComplete {
                    battle_id: record.battle_id.clone(),
                },
            );
        }
        self.directory.remove_session(&record.battle_id);
        info!(battle_id = %record.battle_id, "battle settled and cleaned up");
    }

    fn build_outcome(&self, entry: &SessionEntry) -> Option<OutcomeRecord> {
        let session = entry.session.lock().ok()?;
        let winner_id = session.winner().and_then(|outcome| match outcome {
            BattleOutcome::Player1 => Some(session.fighter(Side::Player1).user_id),
            BattleOutcome::Player2 => Some(session.fighter(Side::Player2).user_id),
            BattleOutcome::Draw => None,
        });
        Some(OutcomeRecord {
            battle_id: session.id().to_string(),
            player1_id: session.fighter(Side::Player1).user_id,
            player2_id: session.fighter(Side::Player2).user_id,
            winner_id,
            threat_peak: session.threat_peak(),
            turns: session.turns(),
        })
    }

    /// Snapshot under the session lock, send after it is released.
    fn broadcast(&self, entry: &SessionEntry, wrap: impl Fn(BattleSnapshot) -> ServerMessage) {
        let snapshots = match entry.session.lock() {
            Ok(session) => [
                session.snapshot(Side::Player1),
                session.snapshot(Side::Player2),
            ],
            Err(_) => return,
        };
        for (side, snapshot) in [Side::Player1, Side::Player2].into_iter().zip(snapshots) {
            self.directory.send(entry.conn_of(side), wrap(snapshot));
        }
    }

    fn send_error(&self, conn: ConnId, message: &str) {
        self.directory.send(
            conn,
            ServerMessage::Error {
                message: message.into(),
            },
        );
    }
}

/// Trim and cap a requested display name; blank names get a generated one.
pub fn sanitize_username(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return format!("Sorcerer-{}", rand::thread_rng().gen_range(1000..10000));
    }
    trimmed.chars().take(24).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use cursebound_protocol::BattleStatus;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::store::MemoryStore;

    fn join_player(
        hub: &Hub,
        username: &str,
        user_id: i64,
    ) -> (ConnId, UnboundedReceiver<ServerMessage>) {
        let conn = hub.allocate_conn();
        let (sender, rx) = mpsc::unbounded_channel();
        hub.connect(conn, sender);
        hub.directory.attach_player(
            conn,
            PlayerMeta {
                username: username.into(),
                user_id,
                character_id: None,
            },
        );
        (conn, rx)
    }

    // A disconnect that lands after the queue's liveness check but before
    // the identity reads leaves the survivor holding a dead pairing. It must
    // go back to the head of the queue, not vanish from matchmaking.
    #[tokio::test]
    async fn test_pairing_requeues_survivor_when_opponent_identity_lost() {
        let hub = Hub::new(Arc::new(MemoryStore::new()));
        let (alive, mut rx) = join_player(&hub, "Gojo", 1);
        // Allocated but never registered, like a connection torn down
        // mid-pairing.
        let gone = hub.allocate_conn();

        hub.start_battle(alive, gone).await;

        assert_eq!(hub.directory.session_count(), 0);
        assert!(hub.queue.contains(alive));

        // Greeting, then a fresh waiting notice after the aborted pairing.
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::QueueStatus { .. })
        ));
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerMessage::QueueStatus { .. })
        ));
    }

    // A disconnect that lands after the identity reads but before the
    // session is registered finds nothing to forfeit in its own handler.
    // The pairing itself must detect the closed side and settle the forfeit
    // so the opponent is never stuck in a battle nobody can end.
    #[tokio::test]
    async fn test_pairing_forfeits_side_that_vanished_after_identity_read() {
        let store = Arc::new(MemoryStore::new());
        let hub = Hub::new(Arc::clone(&store) as Arc<dyn UserStore>);

        let (alive, mut rx) = join_player(&hub, "Gojo", 1);
        let (gone, gone_rx) = join_player(&hub, "Sukuna", 2);
        // Closing the channel makes the connection read as dead while its
        // player identity is still registered, which is exactly the window.
        drop(gone_rx);

        hub.start_battle(alive, gone).await;

        assert_eq!(hub.directory.session_count(), 0);

        let mut saw_end = false;
        let mut battle_id = None;
        while let Ok(message) = rx.try_recv() {
            match message {
                ServerMessage::BattleEnd(snapshot) => {
                    assert_eq!(snapshot.status, BattleStatus::Finished);
                    assert_eq!(snapshot.winner, Some(BattleOutcome::Player1));
                    saw_end = true;
                }
                ServerMessage::BattleComplete { battle_id: id } => battle_id = Some(id),
                _ => {}
            }
        }
        assert!(saw_end);

        let battle_id = battle_id.expect("survivor should receive completion");
        let record = store.outcome(&battle_id).expect("outcome persisted");
        assert_eq!(record.winner_id, Some(1));
    }

    #[test]
    fn test_sanitize_keeps_reasonable_names() {
        assert_eq!(sanitize_username("Gojo"), "Gojo");
        assert_eq!(sanitize_username("  Gojo  "), "Gojo");
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "x".repeat(40);
        assert_eq!(sanitize_username(&long).chars().count(), 24);
    }

    #[test]
    fn test_sanitize_generates_name_for_blank() {
        for raw in ["", "   ", "\t\n"] {
            let name = sanitize_username(raw);
            let suffix = name.strip_prefix("Sorcerer-").unwrap();
            assert_eq!(suffix.len(), 4);
            assert!(suffix.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
