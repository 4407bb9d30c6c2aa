//! Outstanding segment requests, keyed by name.
//!
//! One entry per name. A session tracks an interest before expressing it and
//! looks the name up again when the answer (or timeout) comes back; an answer
//! for an untracked name is a duplicate.

use std::collections::HashMap;
use std::time::Instant;

use crate::name::ContentName;
use crate::transport::Interest;

/// A tracked request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub interest: Interest,
    /// 1-based count of times this name has been expressed (or scheduled).
    pub attempt: u32,
    /// Set while a retry waits for its backoff; the interest is not on the face.
    pub retry_at: Option<Instant>,
}

impl Pending {
    pub fn segment(&self) -> Option<u64> {
        self.interest.name.segment()
    }
}

#[derive(Debug, Default)]
pub struct PendingTracker {
    entries: HashMap<ContentName, Pending>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a first attempt. Returns `false` (and changes nothing) if the
    /// name is already tracked.
    pub fn track(&mut self, interest: Interest) -> bool {
        if self.entries.contains_key(&interest.name) {
            return false;
        }
        let name = interest.name.clone();
        self.entries.insert(
            name,
            Pending {
                interest,
                attempt: 1,
                retry_at: None,
            },
        );
        true
    }

    /// Re-track a timed-out request for another attempt, optionally deferred.
    pub fn retrack(&mut self, mut pending: Pending, retry_at: Option<Instant>) {
        pending.attempt = pending.attempt.saturating_add(1);
        pending.retry_at = retry_at;
        self.entries.insert(pending.interest.name.clone(), pending);
    }

    /// Remove on answer. `None` for an untracked name.
    pub fn resolve(&mut self, name: &ContentName) -> Option<Pending> {
        self.entries.remove(name)
    }

    /// Remove on timeout. Deferred entries are not on the face and cannot
    /// time out, so they are left alone.
    pub fn timeout(&mut self, name: &ContentName) -> Option<Pending> {
        match self.entries.get(name) {
            Some(p) if p.retry_at.is_none() => self.entries.remove(name),
            _ => None,
        }
    }

    /// Deferred retries whose time has come, in segment order; they are
    /// marked as expressed.
    pub fn take_due(&mut self, now: Instant) -> Vec<Interest> {
        let mut due: Vec<Interest> = self
            .entries
            .values_mut()
            .filter(|p| p.retry_at.is_some_and(|t| t <= now))
            .map(|p| {
                p.retry_at = None;
                p.interest.clone()
            })
            .collect();
        due.sort_by_key(|i| i.name.segment());
        due
    }

    /// Earliest deferred retry, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.entries.values().filter_map(|p| p.retry_at).min()
    }

    /// Remove every request for a segment past `final_segment`.
    pub fn withdraw_beyond(&mut self, final_segment: u64) -> Vec<Pending> {
        let names: Vec<ContentName> = self
            .entries
            .iter()
            .filter(|(_, p)| p.segment().is_some_and(|s| s > final_segment))
            .map(|(n, _)| n.clone())
            .collect();
        names
            .iter()
            .filter_map(|n| self.entries.remove(n))
            .collect()
    }

    /// Remove everything (cancellation).
    pub fn drain(&mut self) -> Vec<Pending> {
        self.entries.drain().map(|(_, p)| p).collect()
    }

    pub fn contains(&self, name: &ContentName) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn seg(i: u64) -> Interest {
        Interest::new(ContentName::parse("/f").append_segment(i))
    }

    #[test]
    fn one_entry_per_name() {
        let mut t = PendingTracker::new();
        assert!(t.track(seg(0)));
        assert!(!t.track(seg(0)));
        assert_eq!(t.len(), 1);
        assert!(t.contains(&seg(0).name));
    }

    #[test]
    fn resolve_removes_and_duplicates_are_untracked() {
        let mut t = PendingTracker::new();
        t.track(seg(1));
        let p = t.resolve(&seg(1).name).unwrap();
        assert_eq!(p.attempt, 1);
        assert_eq!(p.segment(), Some(1));
        assert!(t.resolve(&seg(1).name).is_none());
        assert!(t.is_empty());
    }

    #[test]
    fn timeout_then_retrack_counts_attempts() {
        let mut t = PendingTracker::new();
        t.track(seg(2));
        let p = t.timeout(&seg(2).name).unwrap();
        t.retrack(p, None);
        let p = t.timeout(&seg(2).name).unwrap();
        assert_eq!(p.attempt, 2);
    }

    #[test]
    fn deferred_retries_become_due() {
        let mut t = PendingTracker::new();
        let now = Instant::now();
        t.track(seg(3));
        t.track(seg(1));
        let p3 = t.timeout(&seg(3).name).unwrap();
        let p1 = t.timeout(&seg(1).name).unwrap();
        t.retrack(p3, Some(now + Duration::from_millis(10)));
        t.retrack(p1, Some(now + Duration::from_millis(20)));

        assert!(t.timeout(&seg(3).name).is_none());
        assert_eq!(t.next_due(), Some(now + Duration::from_millis(10)));
        assert!(t.take_due(now).is_empty());
        let due = t.take_due(now + Duration::from_millis(30));
        assert_eq!(due, vec![seg(1), seg(3)]);
        assert_eq!(t.next_due(), None);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn withdraw_beyond_final() {
        let mut t = PendingTracker::new();
        for i in 0..6 {
            t.track(seg(i));
        }
        let mut gone: Vec<u64> = t
            .withdraw_beyond(3)
            .iter()
            .filter_map(Pending::segment)
            .collect();
        gone.sort();
        assert_eq!(gone, vec![4, 5]);
        assert_eq!(t.len(), 4);
        assert_eq!(t.drain().len(), 4);
        assert!(t.is_empty());
    }
}
