//! Per-space security state
//!
//! Every mutation here is synchronous. Callers hold the space's lock for
//! the duration of one method call and never across an await, so each
//! read-modify-write below is atomic with respect to other handlers.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use warden_types::UserId;

use crate::config::ModerationConfig;
use crate::window::SlidingWindow;

#[derive(Debug, Clone)]
pub struct SecurityState {
    spam_capacity: usize,
    spam_tracker: HashMap<UserId, SlidingWindow>,
    raid_joins: SlidingWindow,
    warning_counts: HashMap<UserId, u32>,
    verification_pending: HashMap<UserId, DateTime<Utc>>,
    suspicious_users: HashSet<UserId>,
    lockdown_active: bool,
}

impl SecurityState {
    pub fn new(config: &ModerationConfig) -> Self {
        Self {
            spam_capacity: config.spam_capacity,
            spam_tracker: HashMap::new(),
            raid_joins: SlidingWindow::new(config.raid_capacity),
            warning_counts: HashMap::new(),
            verification_pending: HashMap::new(),
            suspicious_users: HashSet::new(),
            lockdown_active: false,
        }
    }

    /// Record a message and report whether it completes a burst.
    ///
    /// A firing burst clears the member's tracker, so the next message
    /// starts a fresh count.
    pub fn record_message(
        &mut self,
        user: UserId,
        at: DateTime<Utc>,
        threshold: usize,
        window: Duration,
    ) -> bool {
        let capacity = self.spam_capacity;
        let tracker = self
            .spam_tracker
            .entry(user)
            .or_insert_with(|| SlidingWindow::new(capacity));
        tracker.record(at);

        if tracker.count_within(at, window) >= threshold {
            tracker.clear();
            true
        } else {
            false
        }
    }

    pub fn record_join(&mut self, at: DateTime<Utc>) {
        self.raid_joins.record(at);
    }

    pub fn recent_joins(&self, now: DateTime<Utc>, window: Duration) -> usize {
        self.raid_joins.count_within(now, window)
    }

    /// Engage lockdown if the join rate crossed the threshold and lockdown
    /// is not already active. Returns the join count that triggered it.
    pub fn try_engage_lockdown(
        &mut self,
        now: DateTime<Utc>,
        threshold: usize,
        window: Duration,
    ) -> Option<usize> {
        if self.lockdown_active {
            return None;
        }
        let joins = self.recent_joins(now, window);
        if joins >= threshold {
            self.lockdown_active = true;
            Some(joins)
        } else {
            None
        }
    }

    pub fn lockdown_active(&self) -> bool {
        self.lockdown_active
    }

    pub fn set_lockdown(&mut self, active: bool) {
        self.lockdown_active = active;
    }

    pub fn warning_count(&self, user: UserId) -> u32 {
        self.warning_counts.get(&user).copied().unwrap_or(0)
    }

    /// Increment and return the member's warning count
    pub fn add_warning(&mut self, user: UserId) -> u32 {
        let count = self.warning_counts.entry(user).or_insert(0);
        *count += 1;
        *count
    }

    pub fn reset_warnings(&mut self, user: UserId) {
        self.warning_counts.insert(user, 0);
    }

    pub fn mark_pending(&mut self, user: UserId, joined_at: DateTime<Utc>) {
        self.verification_pending.insert(user, joined_at);
    }

    /// Returns true when the member was pending
    pub fn clear_pending(&mut self, user: UserId) -> bool {
        self.verification_pending.remove(&user).is_some()
    }

    pub fn is_pending(&self, user: UserId) -> bool {
        self.verification_pending.contains_key(&user)
    }

    pub fn pending_count(&self) -> usize {
        self.verification_pending.len()
    }

    /// Forget every pending verification; returns how many were dropped
    pub fn clear_all_pending(&mut self) -> usize {
        let dropped = self.verification_pending.len();
        self.verification_pending.clear();
        dropped
    }

    /// Members pending for longer than `max_age`
    pub fn expired_pending(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<UserId> {
        let mut expired: Vec<_> = self
            .verification_pending
            .iter()
            .filter(|(_, joined)| now - **joined > max_age)
            .map(|(user, _)| *user)
            .collect();
        expired.sort();
        expired
    }

    pub fn flag_suspicious(&mut self, user: UserId) {
        self.suspicious_users.insert(user);
    }

    pub fn is_suspicious(&self, user: UserId) -> bool {
        self.suspicious_users.contains(&user)
    }

    pub fn suspicious_count(&self) -> usize {
        self.suspicious_users.len()
    }

    /// Drop verification bookkeeping for a member who left or verified
    pub fn forget_member(&mut self, user: UserId) {
        self.verification_pending.remove(&user);
        self.suspicious_users.remove(&user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SecurityState {
        SecurityState::new(&ModerationConfig::default())
    }

    #[test]
    fn test_burst_fires_once_then_resets() {
        let mut s = state();
        let user = UserId::new(1);
        let start = Utc::now();
        let window = Duration::seconds(5);

        let fired: Vec<_> = (0..5)
            .map(|i| s.record_message(user, start + Duration::milliseconds(i * 500), 5, window))
            .collect();
        assert_eq!(fired, vec![false, false, false, false, true]);

        // A sixth message one second later does not re-flag
        assert!(!s.record_message(user, start + Duration::seconds(3), 5, window));
    }

    #[test]
    fn test_bursts_are_per_member() {
        let mut s = state();
        let start = Utc::now();
        for i in 0..4 {
            s.record_message(UserId::new(1), start + Duration::milliseconds(i), 5, Duration::seconds(5));
        }
        assert!(!s.record_message(UserId::new(2), start, 5, Duration::seconds(5)));
    }

    #[test]
    fn test_lockdown_is_edge_triggered() {
        let mut s = state();
        let start = Utc::now();
        for i in 0..10 {
            s.record_join(start + Duration::milliseconds(i * 100));
        }

        let now = start + Duration::seconds(2);
        assert_eq!(s.try_engage_lockdown(now, 10, Duration::seconds(10)), Some(10));
        assert!(s.lockdown_active());
        assert_eq!(s.try_engage_lockdown(now, 10, Duration::seconds(10)), None);
    }

    #[test]
    fn test_slow_joins_do_not_lock_down() {
        let mut s = state();
        let start = Utc::now();
        for i in 0..10 {
            s.record_join(start + Duration::seconds(i * 5));
        }
        assert_eq!(
            s.try_engage_lockdown(start + Duration::seconds(46), 10, Duration::seconds(10)),
            None
        );
    }

    #[test]
    fn test_expired_pending() {
        let mut s = state();
        let now = Utc::now();
        s.mark_pending(UserId::new(1), now - Duration::seconds(3601));
        s.mark_pending(UserId::new(2), now - Duration::seconds(60));

        assert_eq!(s.expired_pending(now, Duration::seconds(3600)), vec![UserId::new(1)]);
        assert!(s.clear_pending(UserId::new(1)));
        assert!(!s.clear_pending(UserId::new(1)));
        assert_eq!(s.pending_count(), 1);
    }

    #[test]
    fn test_forget_member() {
        let mut s = state();
        let user = UserId::new(5);
        s.mark_pending(user, Utc::now());
        s.flag_suspicious(user);
        s.forget_member(user);
        assert!(!s.is_pending(user));
        assert!(!s.is_suspicious(user));
    }

    #[test]
    fn test_clear_all_pending() {
        let mut s = state();
        s.mark_pending(UserId::new(1), Utc::now());
        s.mark_pending(UserId::new(2), Utc::now());
        assert_eq!(s.clear_all_pending(), 2);
        assert_eq!(s.pending_count(), 0);
    }
}
