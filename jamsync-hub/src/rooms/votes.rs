use std::collections::{HashMap, HashSet};

use crate::db::{SongId, UserId};

/// Accumulates distinct per-user votes against the currently playing
/// track and evaluates quorum.
///
/// Votes are scoped to a track instance and must be cleared whenever that
/// track stops being current. Pause and seek intentionally leave the vote
/// set alone.
#[derive(Debug, Default)]
pub struct SkipVotes {
    votes: HashMap<SongId, HashSet<UserId>>,
}

/// The minimum distinct-voter count required to force a skip.
pub fn quorum(member_count: usize) -> usize {
    member_count.div_ceil(2)
}

impl SkipVotes {
    pub fn new() -> Self {
        Default::default()
    }

    /// Records a vote and returns the new count. A repeat vote from the
    /// same user does not increase the count.
    pub fn cast(&mut self, song_id: &SongId, user_id: &UserId) -> usize {
        let voters = self.votes.entry(song_id.clone()).or_default();
        voters.insert(user_id.clone());

        voters.len()
    }

    pub fn count(&self, song_id: &SongId) -> usize {
        self.votes.get(song_id).map(|v| v.len()).unwrap_or(0)
    }

    /// True iff the vote count for the track reaches quorum.
    pub fn reached(&self, song_id: &SongId, member_count: usize) -> bool {
        self.count(song_id) >= quorum(member_count)
    }

    /// Drops all votes for a track instance.
    pub fn clear(&mut self, song_id: &SongId) {
        self.votes.remove(song_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_is_half_rounded_up() {
        assert_eq!(quorum(0), 0);
        assert_eq!(quorum(1), 1);
        assert_eq!(quorum(2), 1);
        assert_eq!(quorum(4), 2);
        assert_eq!(quorum(5), 3);
    }

    #[test]
    fn repeat_votes_do_not_count_twice() {
        let mut votes = SkipVotes::new();
        let song = "s1".to_string();

        assert_eq!(votes.cast(&song, &"u1".to_string()), 1);
        assert_eq!(votes.cast(&song, &"u1".to_string()), 1);
        assert_eq!(votes.cast(&song, &"u2".to_string()), 2);
    }

    #[test]
    fn lone_listener_can_self_skip() {
        let mut votes = SkipVotes::new();
        let song = "s1".to_string();

        votes.cast(&song, &"u1".to_string());
        assert!(votes.reached(&song, 1));
    }

    #[test]
    fn four_members_reach_quorum_at_two() {
        let mut votes = SkipVotes::new();
        let song = "s1".to_string();

        votes.cast(&song, &"u1".to_string());
        assert!(!votes.reached(&song, 4));

        votes.cast(&song, &"u2".to_string());
        assert!(votes.reached(&song, 4));
    }

    #[test]
    fn clearing_forgets_the_track() {
        let mut votes = SkipVotes::new();
        let song = "s1".to_string();

        votes.cast(&song, &"u1".to_string());
        votes.clear(&song);

        assert_eq!(votes.count(&song), 0);
    }
}
