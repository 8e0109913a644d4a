use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::scene::ReceiverId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Claim {
    InProgress,
    Done,
    Failed,
}

/// Receivers already taken by a grid run.
///
/// Shared by every worker; a receiver lying in several cells is computed by
/// whichever worker claims it first. A failed receiver stays claimed for the
/// rest of its run and is released when the next run starts.
#[derive(Debug, Default)]
pub struct ReceiverDedupSet {
    claims: Mutex<HashMap<ReceiverId, Claim>>,
}

impl ReceiverDedupSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ReceiverId, Claim>> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `id` for processing. Returns `false` if it is already claimed
    /// or done.
    pub fn try_claim(&self, id: ReceiverId) -> bool {
        let mut claims = self.lock();
        if claims.contains_key(&id) {
            return false;
        }
        claims.insert(id, Claim::InProgress);
        true
    }

    /// Records `id` as finished.
    pub fn mark_done(&self, id: ReceiverId) {
        self.lock().insert(id, Claim::Done);
    }

    /// Records `id` as failed. It is not claimed again until
    /// [`release_failed`](Self::release_failed).
    pub fn mark_failed(&self, id: ReceiverId) {
        let mut claims = self.lock();
        if claims.get(&id) == Some(&Claim::InProgress) {
            claims.insert(id, Claim::Failed);
        }
    }

    /// Drops every failed claim so that the receivers can be retried.
    /// Returns the number of claims dropped.
    pub fn release_failed(&self) -> usize {
        let mut claims = self.lock();
        let before = claims.len();
        claims.retain(|_, c| *c != Claim::Failed);
        before - claims.len()
    }

    /// Returns `true` if `id` is claimed, done or failed.
    #[must_use]
    pub fn contains(&self, id: ReceiverId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Returns `true` if `id` is done.
    #[must_use]
    pub fn is_done(&self, id: ReceiverId) -> bool {
        self.lock().get(&id) == Some(&Claim::Done)
    }

    /// Number of finished receivers.
    #[must_use]
    pub fn done_count(&self) -> usize {
        self.lock().values().filter(|c| **c == Claim::Done).count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn claim_is_exclusive() {
        let set = ReceiverDedupSet::new();
        assert!(set.try_claim(ReceiverId(1)));
        assert!(!set.try_claim(ReceiverId(1)));
        set.mark_done(ReceiverId(1));
        assert!(!set.try_claim(ReceiverId(1)));
        assert!(set.is_done(ReceiverId(1)));
    }

    #[test]
    fn failed_receiver_stays_claimed_until_released() {
        let set = ReceiverDedupSet::new();
        assert!(set.try_claim(ReceiverId(2)));
        set.mark_failed(ReceiverId(2));
        assert!(set.contains(ReceiverId(2)));
        assert!(!set.try_claim(ReceiverId(2)));
        assert!(!set.is_done(ReceiverId(2)));

        assert!(set.try_claim(ReceiverId(3)));
        set.mark_done(ReceiverId(3));
        set.mark_failed(ReceiverId(3));
        assert_eq!(set.release_failed(), 1);
        assert!(set.is_done(ReceiverId(3)));
        assert!(set.try_claim(ReceiverId(2)));
    }

    #[test]
    fn concurrent_claims_have_one_winner() {
        let set = Arc::new(ReceiverDedupSet::new());
        let winners: usize = (0..8)
            .map(|_| {
                let set = Arc::clone(&set);
                thread::spawn(move || usize::from(set.try_claim(ReceiverId(7))))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap_or(0))
            .sum();
        assert_eq!(winners, 1);
    }
}
