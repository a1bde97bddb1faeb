use serenity::model::id::UserId;
use std::collections::HashSet;

/// Distinct voters asking to skip the active request.
///
/// Cleared whenever a new request becomes active or a skip goes through.
#[derive(Debug, Clone)]
pub struct SkipVoteTracker {
    voters: HashSet<UserId>,
    threshold: usize,
}

/// Result of recording a single vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    /// New voter; carries the number of distinct votes so far.
    Counted(usize),
    Duplicate,
}

impl SkipVoteTracker {
    pub fn new(threshold: usize) -> Self {
        Self {
            voters: HashSet::new(),
            threshold: threshold.max(1),
        }
    }

    pub fn record(&mut self, voter: UserId) -> Vote {
        if self.voters.insert(voter) {
            Vote::Counted(self.voters.len())
        } else {
            Vote::Duplicate
        }
    }

    pub fn reached(&self) -> bool {
        self.voters.len() >= self.threshold
    }

    pub fn count(&self) -> usize {
        self.voters.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn clear(&mut self) {
        self.voters.clear();
    }
}

/// Who may force a skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipPolicy {
    /// Privileged identity: always skips, and its own requests are immune to votes.
    pub owner: Option<UserId>,
    pub votes_to_skip: usize,
}

impl SkipPolicy {
    pub fn is_owner(&self, user: UserId) -> bool {
        self.owner == Some(user)
    }
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self {
            owner: None,
            votes_to_skip: 3,
        }
    }
}

/// What a skip request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipOutcome {
    NothingPlaying,
    /// The active stream was told to stop.
    Skipped,
    /// A lingering stream that had already ended was force-stopped.
    Cleanup,
    VoteRecorded { votes: usize, needed: usize },
    AlreadyVoted,
    /// Vote recorded against an owner's request; it will never skip.
    OwnerImmune { votes: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64) -> UserId {
        UserId::new(id)
    }

    #[test]
    fn duplicate_votes_count_once() {
        let mut tracker = SkipVoteTracker::new(3);
        assert_eq!(tracker.record(user(1)), Vote::Counted(1));
        assert_eq!(tracker.record(user(1)), Vote::Duplicate);
        assert_eq!(tracker.count(), 1);
        assert!(!tracker.reached());
    }

    #[test]
    fn threshold_needs_three_distinct_voters() {
        let mut tracker = SkipVoteTracker::new(3);
        tracker.record(user(1));
        tracker.record(user(2));
        assert!(!tracker.reached());
        assert_eq!(tracker.record(user(3)), Vote::Counted(3));
        assert!(tracker.reached());

        tracker.clear();
        assert_eq!(tracker.count(), 0);
        assert_eq!(tracker.threshold(), 3);
    }

    #[test]
    fn zero_threshold_is_raised_to_one() {
        let mut tracker = SkipVoteTracker::new(0);
        assert!(!tracker.reached());
        tracker.record(user(9));
        assert!(tracker.reached());
    }

    #[test]
    fn owner_detection() {
        let policy = SkipPolicy {
            owner: Some(user(42)),
            ..SkipPolicy::default()
        };
        assert!(policy.is_owner(user(42)));
        assert!(!policy.is_owner(user(1)));
        assert!(!SkipPolicy::default().is_owner(user(42)));
    }
}
