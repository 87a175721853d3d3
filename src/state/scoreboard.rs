//! Per-seat scores with level scaling.

use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    config::ScoreScaling,
    state::{
        game::{PlayerId, PlayerScore},
        ports::SessionPorts,
    },
};

impl ScoreScaling {
    /// Scale a raw amount by the current level. Non-decreasing in `level`.
    pub fn apply(self, raw: u32, level: u32) -> u64 {
        let raw = u64::from(raw);
        let level = u64::from(level);
        match self {
            ScoreScaling::Flat => raw,
            ScoreScaling::Linear => raw.saturating_mul(level),
            ScoreScaling::Quadratic => raw.saturating_mul(level.saturating_mul(level)),
        }
    }
}

/// Per-seat scores for the current match.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    scores: BTreeMap<PlayerId, u64>,
    seats: usize,
    scaling: ScoreScaling,
}

impl ScoreAggregator {
    /// Track `seats` players, all starting at zero.
    pub fn new(seats: usize, scaling: ScoreScaling) -> Self {
        let mut aggregator = Self {
            scores: BTreeMap::new(),
            seats,
            scaling,
        };
        aggregator.zero();
        aggregator
    }

    /// Add the level-scaled `raw` amount to a player and broadcast the scoreboard.
    pub fn increment(&mut self, player: PlayerId, raw: u32, level: u32, ports: &SessionPorts) {
        let delta = self.scaling.apply(raw, level);
        let score = self.scores.entry(player).or_insert(0);
        *score = score.saturating_add(delta);
        debug!(%player, delta, score = *score, "score increased");
        ports.update_scoreboard(self.snapshot());
    }

    /// Subtract the level-scaled `amount`, never going below zero, and broadcast the scoreboard.
    pub fn decrement(&mut self, player: PlayerId, amount: u32, level: u32, ports: &SessionPorts) {
        let delta = self.scaling.apply(amount, level);
        let score = self.scores.entry(player).or_insert(0);
        *score = score.saturating_sub(delta);
        debug!(%player, delta, score = *score, "score decreased");
        ports.update_scoreboard(self.snapshot());
    }

    /// Score of one seat, zero when unknown.
    pub fn score(&self, player: PlayerId) -> u64 {
        self.scores.get(&player).copied().unwrap_or(0)
    }

    /// Scores ordered by player id.
    pub fn snapshot(&self) -> Vec<PlayerScore> {
        self.scores
            .iter()
            .map(|(&player_id, &score)| PlayerScore { player_id, score })
            .collect()
    }

    /// Final standings: highest score first, ties by ascending player id.
    pub fn finalize(&self) -> Vec<PlayerScore> {
        let mut standings = self.snapshot();
        standings.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        standings
    }

    /// Zero every seat and broadcast the empty scoreboard.
    pub fn reset(&mut self, ports: &SessionPorts) {
        self.zero();
        ports.update_scoreboard(self.snapshot());
    }

    fn zero(&mut self) {
        self.scores = PlayerId::all().take(self.seats).map(|id| (id, 0)).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dto::ws::OutboundMessage, state::testing::RecordingOutbox};

    fn id(raw: u8) -> PlayerId {
        PlayerId::new(raw).unwrap()
    }

    #[test]
    fn scaling_rewards_higher_levels() {
        assert_eq!(ScoreScaling::Flat.apply(10, 3), 10);
        assert_eq!(ScoreScaling::Linear.apply(10, 3), 30);
        assert_eq!(ScoreScaling::Quadratic.apply(10, 3), 90);
        for scaling in [
            ScoreScaling::Flat,
            ScoreScaling::Linear,
            ScoreScaling::Quadratic,
        ] {
            for level in 1..10 {
                assert!(scaling.apply(5, level) <= scaling.apply(5, level + 1));
            }
        }
    }

    #[test]
    fn score_never_goes_negative() {
        let outbox = RecordingOutbox::new();
        let ports = outbox.ports();
        let mut scores = ScoreAggregator::new(4, ScoreScaling::Linear);

        let ops: [(bool, u32, u32); 8] = [
            (false, 3, 1),
            (true, 10, 1),
            (false, 3, 5),
            (false, 3, 5),
            (true, 1, 2),
            (false, 50, 1),
            (true, 7, 3),
            (false, 3, 2),
        ];
        let mut expected: i64 = 0;
        for (gain, amount, level) in ops {
            let delta = i64::from(amount) * i64::from(level);
            if gain {
                scores.increment(id(1), amount, level, &ports);
                expected += delta;
            } else {
                scores.decrement(id(1), amount, level, &ports);
                expected = (expected - delta).max(0);
            }
            assert_eq!(scores.score(id(1)) as i64, expected);
        }
        assert_eq!(scores.score(id(1)), 15);
    }

    #[test]
    fn decrement_floors_at_zero() {
        let outbox = RecordingOutbox::new();
        let ports = outbox.ports();
        let mut scores = ScoreAggregator::new(4, ScoreScaling::Linear);
        scores.increment(id(0), 2, 1, &ports);
        scores.decrement(id(0), 3, 4, &ports);
        assert_eq!(scores.score(id(0)), 0);
    }

    #[test]
    fn every_mutation_broadcasts_ordered_snapshot() {
        let outbox = RecordingOutbox::new();
        let ports = outbox.ports();
        let mut scores = ScoreAggregator::new(3, ScoreScaling::Flat);
        scores.increment(id(2), 5, 1, &ports);

        assert_eq!(
            outbox.messages(),
            vec![OutboundMessage::UpdateScoreboard {
                scores: vec![
                    PlayerScore {
                        player_id: id(0),
                        score: 0,
                    },
                    PlayerScore {
                        player_id: id(1),
                        score: 0,
                    },
                    PlayerScore {
                        player_id: id(2),
                        score: 5,
                    },
                ],
            }]
        );
    }

    #[test]
    fn finalize_is_independent_of_increment_order() {
        let outbox = RecordingOutbox::new();
        let ports = outbox.ports();

        let mut forward = ScoreAggregator::new(4, ScoreScaling::Flat);
        forward.increment(id(0), 10, 1, &ports);
        forward.increment(id(1), 30, 1, &ports);
        forward.increment(id(2), 10, 1, &ports);
        forward.increment(id(3), 5, 1, &ports);
        forward.increment(id(3), 5, 1, &ports);

        let mut backward = ScoreAggregator::new(4, ScoreScaling::Flat);
        backward.increment(id(3), 10, 1, &ports);
        backward.increment(id(2), 4, 1, &ports);
        backward.increment(id(1), 30, 1, &ports);
        backward.increment(id(2), 6, 1, &ports);
        backward.increment(id(0), 10, 1, &ports);

        let standings = forward.finalize();
        assert_eq!(standings, backward.finalize());
        let order: Vec<u8> = standings.iter().map(|s| s.player_id.get()).collect();
        assert_eq!(order, vec![1, 0, 2, 3]);
    }

    #[test]
    fn reset_zeroes_all_seats() {
        let outbox = RecordingOutbox::new();
        let ports = outbox.ports();
        let mut scores = ScoreAggregator::new(2, ScoreScaling::Linear);
        scores.increment(id(1), 4, 2, &ports);
        scores.reset(&ports);
        assert!(scores.snapshot().iter().all(|entry| entry.score == 0));
        assert_eq!(scores.snapshot().len(), 2);
    }
}
