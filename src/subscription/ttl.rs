//! Per-resource TTL deadlines.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

/// Tracks the expiry deadline of every resource the server sent with a TTL.
///
/// `deadlines` is authoritative; the heap is an expiry index with lazy
/// invalidation. Re-arming or cancelling a name leaves its old heap entry
/// behind, and entries are validated against `deadlines` when popped.
#[derive(Debug, Default)]
pub(crate) struct TtlTracker {
    deadlines: HashMap<String, Instant>,
    queue: BinaryHeap<Reverse<(Instant, String)>>,
}

impl TtlTracker {
    /// Arm (or re-arm) the timer for `name` at `now + ttl`.
    pub(crate) fn set(&mut self, name: &str, ttl: Duration, now: Instant) {
        let deadline = now + ttl;
        self.deadlines.insert(name.to_string(), deadline);
        self.queue.push(Reverse((deadline, name.to_string())));
    }

    /// Cancel any armed timer for `name`.
    pub(crate) fn clear(&mut self, name: &str) {
        self.deadlines.remove(name);
    }

    /// Earliest live deadline, if any. Prunes stale heap entries on the way.
    pub(crate) fn next_deadline(&mut self) -> Option<Instant> {
        loop {
            match self.queue.peek() {
                Some(Reverse((deadline, name))) => {
                    if self.deadlines.get(name.as_str()) == Some(deadline) {
                        return Some(*deadline);
                    }
                }
                None => return None,
            }
            self.queue.pop();
        }
    }

    /// Remove and return every name whose deadline has lapsed at `now`, in
    /// deadline order.
    pub(crate) fn take_expired(&mut self, now: Instant) -> Vec<String> {
        let mut expired = Vec::new();
        while let Some(Reverse((deadline, name))) = self.queue.peek() {
            if *deadline > now {
                break;
            }
            let (deadline, name) = (*deadline, name.clone());
            self.queue.pop();
            if self.deadlines.get(&name) == Some(&deadline) {
                self.deadlines.remove(&name);
                expired.push(name);
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_at_deadline() {
        let now = Instant::now();
        let mut ttl = TtlTracker::default();
        ttl.set("a", Duration::from_millis(100), now);

        assert!(ttl.take_expired(now + Duration::from_millis(99)).is_empty());
        assert_eq!(
            ttl.take_expired(now + Duration::from_millis(100)),
            vec!["a".to_string()]
        );
        // Consumed; a later poll reports nothing.
        assert!(ttl.take_expired(now + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_rearm_supersedes_old_deadline() {
        let now = Instant::now();
        let mut ttl = TtlTracker::default();
        ttl.set("a", Duration::from_millis(100), now);
        ttl.set("a", Duration::from_millis(500), now);

        assert!(ttl.take_expired(now + Duration::from_millis(100)).is_empty());
        assert_eq!(
            ttl.next_deadline(),
            Some(now + Duration::from_millis(500))
        );
        assert_eq!(
            ttl.take_expired(now + Duration::from_millis(500)),
            vec!["a".to_string()]
        );
    }

    #[test]
    fn test_clear_cancels_expiry() {
        let now = Instant::now();
        let mut ttl = TtlTracker::default();
        ttl.set("a", Duration::from_millis(100), now);
        ttl.clear("a");

        assert_eq!(ttl.next_deadline(), None);
        assert!(ttl.take_expired(now + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn test_next_deadline_is_earliest() {
        let now = Instant::now();
        let mut ttl = TtlTracker::default();
        ttl.set("slow", Duration::from_secs(5), now);
        ttl.set("fast", Duration::from_millis(50), now);

        assert_eq!(ttl.next_deadline(), Some(now + Duration::from_millis(50)));
    }

    #[test]
    fn test_expiry_order_follows_deadlines() {
        let now = Instant::now();
        let mut ttl = TtlTracker::default();
        ttl.set("b", Duration::from_millis(200), now);
        ttl.set("a", Duration::from_millis(100), now);

        assert_eq!(
            ttl.take_expired(now + Duration::from_millis(300)),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
