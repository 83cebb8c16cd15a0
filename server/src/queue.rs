//! FIFO matchmaking queue.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::directory::ConnId;

/// Ordered waiting list of participants not yet in a match.
///
/// Pairing is strict FIFO (no skill matching), so any participant that
/// stays connected is eventually paired once a second connected participant
/// exists.
pub struct MatchQueue {
    waiting: Mutex<VecDeque<ConnId>>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self {
            waiting: Mutex::new(VecDeque::new()),
        }
    }

    /// Append to the tail. Returns false if the participant is already
    /// queued.
    pub fn enqueue(&self, conn: ConnId) -> bool {
        let Ok(mut waiting) = self.waiting.lock() else {
            return false;
        };
        if waiting.contains(&conn) {
            return false;
        }
        waiting.push_back(conn);
        true
    }

    pub fn contains(&self, conn: ConnId) -> bool {
        self.waiting
            .lock()
            .map(|waiting| waiting.contains(&conn))
            .unwrap_or(false)
    }

    /// Return a participant to the head of the queue, keeping its priority.
    /// A no-op if it is already queued.
    pub fn requeue_front(&self, conn: ConnId) {
        if let Ok(mut waiting) = self.waiting.lock()
            && !waiting.contains(&conn)
        {
            waiting.push_front(conn);
        }
    }

    /// Remove a participant wherever it sits in the queue.
    pub fn remove(&self, conn: ConnId) {
        if let Ok(mut waiting) = self.waiting.lock() {
            waiting.retain(|queued| *queued != conn);
        }
    }

    pub fn len(&self) -> usize {
        self.waiting.lock().map(|waiting| waiting.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pair the two oldest live entries while at least two remain.
    ///
    /// A dead head is discarded and the loop retries without consuming a
    /// second entry. A dead second returns the first to the head of the
    /// queue, preserving its priority, and halts pairing until the next
    /// attempt.
    pub fn try_pair(&self, is_alive: impl Fn(ConnId) -> bool) -> Vec<(ConnId, ConnId)> {
        let Ok(mut waiting) = self.waiting.lock() else {
            return Vec::new();
        };

        let mut pairs = Vec::new();
        while waiting.len() >= 2 {
            let Some(first) = waiting.pop_front() else {
                break;
            };
            if !is_alive(first) {
                continue;
            }
            let Some(second) = waiting.pop_front() else {
                waiting.push_front(first);
                break;
            };
            if !is_alive(second) {
                waiting.push_front(first);
                break;
            }
            pairs.push((first, second));
        }
        pairs
    }
}

impl Default for MatchQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::Directory;

    fn conns(n: usize) -> Vec<ConnId> {
        let directory = Directory::new();
        (0..n).map(|_| directory.allocate_conn()).collect()
    }

    #[test]
    fn test_pairing_is_fifo() {
        let queue = MatchQueue::new();
        let c = conns(3);
        for conn in &c {
            assert!(queue.enqueue(*conn));
        }

        let pairs = queue.try_pair(|_| true);

        assert_eq!(pairs, vec![(c[0], c[1])]);
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(c[2]));
    }

    #[test]
    fn test_duplicate_enqueue_refused() {
        let queue = MatchQueue::new();
        let c = conns(1);

        assert!(queue.enqueue(c[0]));
        assert!(!queue.enqueue(c[0]));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_dead_head_discarded_and_retry() {
        let queue = MatchQueue::new();
        let c = conns(3);
        for conn in &c {
            queue.enqueue(*conn);
        }

        let pairs = queue.try_pair(|conn| conn != c[0]);

        assert_eq!(pairs, vec![(c[1], c[2])]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dead_second_returns_first_to_head_and_halts() {
        let queue = MatchQueue::new();
        let c = conns(4);
        for conn in &c {
            queue.enqueue(*conn);
        }

        let pairs = queue.try_pair(|conn| conn != c[1]);

        assert!(pairs.is_empty());
        // First entry keeps its priority; the dead second is consumed.
        let next = queue.try_pair(|_| true);
        assert_eq!(next, vec![(c[0], c[2])]);
        assert!(queue.contains(c[3]));
    }

    #[test]
    fn test_drains_multiple_pairs() {
        let queue = MatchQueue::new();
        let c = conns(4);
        for conn in &c {
            queue.enqueue(*conn);
        }

        let pairs = queue.try_pair(|_| true);

        assert_eq!(pairs, vec![(c[0], c[1]), (c[2], c[3])]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_requeue_front_restores_priority() {
        let queue = MatchQueue::new();
        let c = conns(3);
        queue.enqueue(c[1]);
        queue.enqueue(c[2]);

        queue.requeue_front(c[0]);
        // Re-requeueing an already queued participant changes nothing.
        queue.requeue_front(c[0]);

        assert_eq!(queue.len(), 3);
        let pairs = queue.try_pair(|_| true);
        assert_eq!(pairs, vec![(c[0], c[1])]);
    }

    #[test]
    fn test_remove_mid_queue() {
        let queue = MatchQueue::new();
        let c = conns(3);
        for conn in &c {
            queue.enqueue(*conn);
        }

        queue.remove(c[1]);

        let pairs = queue.try_pair(|_| true);
        assert_eq!(pairs, vec![(c[0], c[2])]);
    }
}
