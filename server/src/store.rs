//! The identity and match-history collaborator seam.
//!
//! The coordinator only ever talks to [`UserStore`]; the durable relational
//! implementation lives behind this trait. [`MemoryStore`] is the
//! in-process implementation used by the binary and the tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

/// A durable user record with win/loss counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub wins: u32,
    pub losses: u32,
}

/// One concluded match, written exactly once per match id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub battle_id: String,
    pub player1_id: i64,
    pub player2_id: i64,
    /// None for a draw.
    pub winner_id: Option<i64>,
    pub threat_peak: u8,
    pub turns: u32,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Identity resolution and terminal persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Resolve a display name to a durable record, creating one if absent.
    async fn find_or_create(&self, username: &str) -> Result<UserRecord, StoreError>;

    /// Atomically bump the winner's win counter and the loser's loss
    /// counter (both skipped for a draw) and insert the outcome record.
    /// Idempotent on the match id: a duplicate call changes nothing.
    async fn record_outcome(&self, outcome: &OutcomeRecord) -> Result<(), StoreError>;

    /// Top players by wins descending, losses ascending, oldest first.
    async fn leaderboard(&self, limit: usize) -> Result<Vec<UserRecord>, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    next_user_id: i64,
    users: Vec<UserRecord>,
    outcomes: HashMap<String, OutcomeRecord>,
}

/// In-memory [`UserStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored outcome for a match, if any. Test/introspection helper.
    pub fn outcome(&self, battle_id: &str) -> Option<OutcomeRecord> {
        self.inner
            .lock()
            .ok()?
            .outcomes
            .get(battle_id)
            .cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".into()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_or_create(&self, username: &str) -> Result<UserRecord, StoreError> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.users.iter().find(|u| u.username == username) {
            return Ok(existing.clone());
        }

        inner.next_user_id += 1;
        let record = UserRecord {
            id: inner.next_user_id,
            username: username.to_string(),
            wins: 0,
            losses: 0,
        };
        inner.users.push(record.clone());
        Ok(record)
    }

    async fn record_outcome(&self, outcome: &OutcomeRecord) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.outcomes.contains_key(&outcome.battle_id) {
            return Ok(());
        }

        if let Some(winner_id) = outcome.winner_id {
            let loser_id = if winner_id == outcome.player1_id {
                outcome.player2_id
            } else {
                outcome.player1_id
            };
            for user in inner.users.iter_mut() {
                if user.id == winner_id {
                    user.wins += 1;
                } else if user.id == loser_id {
                    user.losses += 1;
                }
            }
        }

        inner
            .outcomes
            .insert(outcome.battle_id.clone(), outcome.clone());
        Ok(())
    }

    async fn leaderboard(&self, limit: usize) -> Result<Vec<UserRecord>, StoreError> {
        let inner = self.lock()?;
        let mut leaders = inner.users.clone();
        // users is in creation order, so a stable sort keeps oldest first
        // among ties.
        leaders.sort_by(|a, b| b.wins.cmp(&a.wins).then(a.losses.cmp(&b.losses)));
        leaders.truncate(limit);
        Ok(leaders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(battle_id: &str, winner_id: Option<i64>) -> OutcomeRecord {
        OutcomeRecord {
            battle_id: battle_id.into(),
            player1_id: 1,
            player2_id: 2,
            winner_id,
            threat_peak: 57,
            turns: 4,
        }
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let store = MemoryStore::new();

        let first = store.find_or_create("Maki").await.unwrap();
        let second = store.find_or_create("Maki").await.unwrap();
        let other = store.find_or_create("Panda").await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_record_outcome_bumps_counters() {
        let store = MemoryStore::new();
        store.find_or_create("Maki").await.unwrap();
        store.find_or_create("Panda").await.unwrap();

        store.record_outcome(&outcome("m1", Some(1))).await.unwrap();

        let winner = store.find_or_create("Maki").await.unwrap();
        let loser = store.find_or_create("Panda").await.unwrap();
        assert_eq!((winner.wins, winner.losses), (1, 0));
        assert_eq!((loser.wins, loser.losses), (0, 1));
        assert_eq!(store.outcome("m1").unwrap().winner_id, Some(1));
    }

    #[tokio::test]
    async fn test_record_outcome_is_idempotent_on_match_id() {
        let store = MemoryStore::new();
        store.find_or_create("Maki").await.unwrap();
        store.find_or_create("Panda").await.unwrap();

        store.record_outcome(&outcome("m1", Some(1))).await.unwrap();
        store.record_outcome(&outcome("m1", Some(1))).await.unwrap();

        let winner = store.find_or_create("Maki").await.unwrap();
        assert_eq!(winner.wins, 1);
    }

    #[tokio::test]
    async fn test_draw_skips_counters() {
        let store = MemoryStore::new();
        store.find_or_create("Maki").await.unwrap();
        store.find_or_create("Panda").await.unwrap();

        store.record_outcome(&outcome("m1", None)).await.unwrap();

        let a = store.find_or_create("Maki").await.unwrap();
        let b = store.find_or_create("Panda").await.unwrap();
        assert_eq!((a.wins, a.losses), (0, 0));
        assert_eq!((b.wins, b.losses), (0, 0));
        assert!(store.outcome("m1").is_some());
    }

    #[tokio::test]
    async fn test_leaderboard_ordering() {
        let store = MemoryStore::new();
        for name in ["A", "B", "C"] {
            store.find_or_create(name).await.unwrap();
        }
        // A beats B twice, C beats B once, then loses to B once.
        store.record_outcome(&outcome("m1", Some(1))).await.unwrap();
        store
            .record_outcome(&OutcomeRecord {
                battle_id: "m2".into(),
                player1_id: 1,
                player2_id: 2,
                winner_id: Some(1),
                threat_peak: 40,
                turns: 3,
            })
            .await
            .unwrap();
        store
            .record_outcome(&OutcomeRecord {
                battle_id: "m3".into(),
                player1_id: 3,
                player2_id: 2,
                winner_id: Some(3),
                threat_peak: 40,
                turns: 3,
            })
            .await
            .unwrap();
        store
            .record_outcome(&OutcomeRecord {
                battle_id: "m4".into(),
                player1_id: 3,
                player2_id: 2,
                winner_id: Some(2),
                threat_peak: 40,
                turns: 3,
            })
            .await
            .unwrap();

        let leaders = store.leaderboard(2).await.unwrap();

        assert_eq!(leaders.len(), 2);
        assert_eq!(leaders[0].username, "A");
        // B and C both have one win; C has fewer losses.
        assert_eq!(leaders[1].username, "C");
    }
}
