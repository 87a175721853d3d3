//! Audience voting: a periodic two-stage vote that adjusts the fall rate or picks a piece.
//!
//! Every cycle opens a first round offering the two categories. Its winner opens a second
//! round with the options of that category; the second winner is applied and the round
//! goes back to idle until the next cycle. Each round reset bumps an epoch that the
//! countdown and window timers carry, so deliveries for an abandoned round do nothing.

use indexmap::IndexMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::{
    config::VotingConfig,
    dto::ws::OutboundMessage,
    state::{
        fall_rate::FallRateController,
        game::TetrominoType,
        ports::{SessionPorts, voting_sequence_message},
        timers::{Scheduler, SessionTimer, TimerId, cancel_slot},
    },
};

/// Number of random piece candidates drawn per cycle.
pub const CANDIDATE_COUNT: usize = 3;

/// Stage of the live voting round, as exposed to spectator clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum VotingStage {
    /// No round is live.
    #[default]
    #[serde(rename = "")]
    None,
    /// First round: pick a category.
    #[serde(rename = "initialDisplay")]
    InitialDisplay,
    /// Second round: raise or lower the fall rate.
    #[serde(rename = "fallRate")]
    FallRate,
    /// Second round: pick one of the candidate pieces.
    #[serde(rename = "tetrominoSelection")]
    TetrominoSelection,
}

impl VotingStage {
    /// Wire name, empty for [`VotingStage::None`].
    pub fn as_str(self) -> &'static str {
        match self {
            VotingStage::None => "",
            VotingStage::InitialDisplay => "initialDisplay",
            VotingStage::FallRate => "fallRate",
            VotingStage::TetrominoSelection => "tetrominoSelection",
        }
    }

    /// How many options spectators may pick from in this stage.
    fn option_count(self) -> usize {
        match self {
            VotingStage::None => 0,
            VotingStage::InitialDisplay | VotingStage::FallRate => 2,
            VotingStage::TetrominoSelection => CANDIDATE_COUNT,
        }
    }
}

/// A ballot option, positional within the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum VoteOption {
    /// First option.
    Option1,
    /// Second option.
    Option2,
    /// Third option, piece selection only.
    Option3,
}

impl VoteOption {
    /// Zero-based position.
    pub fn index(self) -> usize {
        match self {
            VoteOption::Option1 => 0,
            VoteOption::Option2 => 1,
            VoteOption::Option3 => 2,
        }
    }
}

/// Category chosen by the first round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteCategory {
    /// Raise or lower the fall rate.
    FallRate,
    /// Pick the next piece.
    TetrominoSelection,
}

impl VoteCategory {
    fn stage(self) -> VotingStage {
        match self {
            VoteCategory::FallRate => VotingStage::FallRate,
            VoteCategory::TetrominoSelection => VotingStage::TetrominoSelection,
        }
    }
}

/// What a call to [`VotingCoordinator::make_decision`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// First round closed; the second round for this category is now live.
    Category(VoteCategory),
    /// Fall rate vote applied; carries the resulting level.
    FallRate(u32),
    /// Piece vote applied; carries the piece every arena should spawn.
    Spawn(TetrominoType),
}

/// State of the live round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotingRound {
    /// Stage on display.
    pub stage: VotingStage,
    /// Remaining countdown steps.
    pub countdown_value: u32,
    /// Ballots per option, in option order.
    pub tallies: IndexMap<VoteOption, u32>,
    /// Pieces offered during piece selection.
    pub candidates: Vec<TetrominoType>,
}

impl VotingRound {
    fn idle(countdown_start: u32) -> Self {
        Self {
            stage: VotingStage::None,
            countdown_value: countdown_start,
            tallies: IndexMap::new(),
            candidates: Vec::new(),
        }
    }

    /// Option with the most votes; the earliest voted option wins ties, option 1 if nobody voted.
    fn leading_option(&self) -> VoteOption {
        let mut best: Option<(VoteOption, u32)> = None;
        for (&option, &count) in &self.tallies {
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((option, count));
            }
        }
        best.map(|(option, _)| option).unwrap_or(VoteOption::Option1)
    }
}

/// Runs the periodic audience vote while an arena is live.
#[derive(Debug)]
pub struct VotingCoordinator {
    config: VotingConfig,
    round: VotingRound,
    round_epoch: u64,
    loop_epoch: u64,
    cycle_timer: Option<TimerId>,
    tick_timer: Option<TimerId>,
    window_timer: Option<TimerId>,
}

impl VotingCoordinator {
    /// Idle coordinator; nothing is armed until the loop starts.
    pub fn new(config: VotingConfig) -> Self {
        Self {
            round: VotingRound::idle(config.countdown_start),
            config,
            round_epoch: 0,
            loop_epoch: 0,
            cycle_timer: None,
            tick_timer: None,
            window_timer: None,
        }
    }

    /// Current stage name, `""` when no round is live.
    pub fn is_vote_running(&self) -> &'static str {
        self.round.stage.as_str()
    }

    /// Stage of the live round.
    pub fn stage(&self) -> VotingStage {
        self.round.stage
    }

    /// Countdown of the live round.
    pub fn countdown_value(&self) -> u32 {
        self.round.countdown_value
    }

    /// The live round.
    pub fn round(&self) -> &VotingRound {
        &self.round
    }

    /// Whether the periodic cycle is armed.
    pub fn is_loop_running(&self) -> bool {
        self.cycle_timer.is_some()
    }

    /// Arm the periodic cycle. Returns `false` when it was already running.
    pub fn start_voting_loop<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) -> bool {
        if self.is_loop_running() {
            return false;
        }
        self.loop_epoch += 1;
        self.cycle_timer = Some(scheduler.schedule_repeating(
            self.config.cycle_period,
            SessionTimer::VotingCycle {
                loop_epoch: self.loop_epoch,
            },
        ));
        info!(period = ?self.config.cycle_period, "voting loop started");
        true
    }

    /// Cancel the cycle and any live round. Returns `false` when nothing was running.
    pub fn stop_voting_loop<S: Scheduler + ?Sized>(
        &mut self,
        scheduler: &mut S,
        ports: &SessionPorts,
    ) -> bool {
        if !self.is_loop_running() {
            return false;
        }
        cancel_slot(scheduler, &mut self.cycle_timer);
        self.loop_epoch += 1;
        if self.round.stage != VotingStage::None {
            ports.hide_voting_sequence();
        }
        self.reset_voting_round(scheduler);
        info!("voting loop stopped");
        true
    }

    /// Open a first round, discarding whatever round was live.
    pub fn generate_first_voting_sequence<S, R>(
        &mut self,
        scheduler: &mut S,
        ports: &SessionPorts,
        rng: &mut R,
    ) where
        S: Scheduler + ?Sized,
        R: Rng + ?Sized,
    {
        self.reset_voting_round(scheduler);
        self.round.stage = VotingStage::InitialDisplay;
        self.round.candidates = (0..CANDIDATE_COUNT)
            .map(|_| TetrominoType::random(rng))
            .collect();
        self.open_round(scheduler, ports);
    }

    /// Open the second round for `category`, keeping the drawn candidates.
    pub fn generate_second_voting_sequence<S: Scheduler + ?Sized>(
        &mut self,
        category: VoteCategory,
        scheduler: &mut S,
        ports: &SessionPorts,
    ) {
        let candidates = std::mem::take(&mut self.round.candidates);
        self.reset_voting_round(scheduler);
        self.round.candidates = candidates;
        self.round.stage = category.stage();
        self.open_round(scheduler, ports);
    }

    /// Record one vote. Options the live stage does not offer are dropped.
    ///
    /// Votes are not deduplicated per connection.
    pub fn get_result(&mut self, option: VoteOption) -> bool {
        if option.index() >= self.round.stage.option_count() {
            return false;
        }
        *self.round.tallies.entry(option).or_insert(0) += 1;
        true
    }

    /// Close the live round on its leading option and apply it.
    pub fn make_decision<S: Scheduler + ?Sized>(
        &mut self,
        fall_rate: &mut FallRateController,
        scheduler: &mut S,
        ports: &SessionPorts,
    ) -> Option<Decision> {
        let stage = self.round.stage;
        if stage == VotingStage::None {
            return None;
        }
        let winner = self.round.leading_option();
        debug!(stage = stage.as_str(), ?winner, tallies = ?self.round.tallies, "vote closed");
        ports.decision(winner);

        let decision = match stage {
            VotingStage::None => return None,
            VotingStage::InitialDisplay => {
                let category = match winner {
                    VoteOption::Option2 => VoteCategory::TetrominoSelection,
                    _ => VoteCategory::FallRate,
                };
                self.generate_second_voting_sequence(category, scheduler, ports);
                return Some(Decision::Category(category));
            }
            VotingStage::FallRate => {
                let level = match winner {
                    VoteOption::Option1 => fall_rate.increase(ports),
                    _ => fall_rate.decrease(ports),
                };
                Decision::FallRate(level)
            }
            VotingStage::TetrominoSelection => {
                let piece = self
                    .round
                    .candidates
                    .get(winner.index())
                    .or_else(|| self.round.candidates.first())
                    .copied()?;
                ports.voted_tetro_to_spawn(piece);
                Decision::Spawn(piece)
            }
        };

        info!(?decision, "vote applied");
        ports.hide_voting_sequence();
        self.reset_voting_round(scheduler);
        Some(decision)
    }

    /// Handle a voting timer delivery; stale epochs are ignored.
    pub fn on_timer<S, R>(
        &mut self,
        timer: SessionTimer,
        fall_rate: &mut FallRateController,
        scheduler: &mut S,
        ports: &SessionPorts,
        rng: &mut R,
    ) where
        S: Scheduler + ?Sized,
        R: Rng + ?Sized,
    {
        match timer {
            SessionTimer::VotingCycle { loop_epoch }
                if loop_epoch == self.loop_epoch && self.is_loop_running() =>
            {
                self.generate_first_voting_sequence(scheduler, ports, rng);
            }
            SessionTimer::VotingTick { round_epoch } if self.is_live(round_epoch) => {
                self.round.countdown_value = self.round.countdown_value.saturating_sub(1);
                if self.round.countdown_value == 0 {
                    cancel_slot(scheduler, &mut self.tick_timer);
                }
            }
            SessionTimer::VotingWindow { round_epoch } if self.is_live(round_epoch) => {
                self.window_timer = None;
                self.make_decision(fall_rate, scheduler, ports);
            }
            other => debug!(timer = ?other, "ignoring stale voting timer"),
        }
    }

    /// `showVotingSequence` for the live round, if any.
    pub fn current_sequence(&self) -> Option<OutboundMessage> {
        (self.round.stage != VotingStage::None)
            .then(|| voting_sequence_message(self.round.stage, &self.round.candidates))
    }

    fn is_live(&self, round_epoch: u64) -> bool {
        round_epoch == self.round_epoch && self.round.stage != VotingStage::None
    }

    fn open_round<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S, ports: &SessionPorts) {
        ports.show_voting_sequence(self.round.stage, &self.round.candidates);
        let round_epoch = self.round_epoch;
        self.tick_timer = Some(scheduler.schedule_repeating(
            self.config.tick_interval,
            SessionTimer::VotingTick { round_epoch },
        ));
        self.window_timer = Some(
            scheduler.schedule_once(self.config.window, SessionTimer::VotingWindow { round_epoch }),
        );
        debug!(stage = self.round.stage.as_str(), round_epoch, "voting round opened");
    }

    fn reset_voting_round<S: Scheduler + ?Sized>(&mut self, scheduler: &mut S) {
        cancel_slot(scheduler, &mut self.tick_timer);
        cancel_slot(scheduler, &mut self.window_timer);
        self.round_epoch += 1;
        self.round = VotingRound::idle(self.config.countdown_start);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        config::FallRateConfig,
        state::testing::{ManualScheduler, RecordingOutbox, run_for},
    };

    struct Harness {
        voting: VotingCoordinator,
        fall_rate: FallRateController,
        scheduler: ManualScheduler,
        outbox: std::sync::Arc<RecordingOutbox>,
        ports: SessionPorts,
        rng: StdRng,
    }

    impl Harness {
        fn new() -> Self {
            let outbox = RecordingOutbox::new();
            Self {
                voting: VotingCoordinator::new(VotingConfig::default()),
                fall_rate: FallRateController::new(FallRateConfig {
                    base: 5,
                    min: 1,
                    max: 10,
                }),
                scheduler: ManualScheduler::new(),
                ports: outbox.ports(),
                outbox,
                rng: StdRng::seed_from_u64(11),
            }
        }

        fn first_round(&mut self) {
            self.voting
                .generate_first_voting_sequence(&mut self.scheduler, &self.ports, &mut self.rng);
        }

        fn decide(&mut self) -> Option<Decision> {
            self.voting
                .make_decision(&mut self.fall_rate, &mut self.scheduler, &self.ports)
        }

        /// Advance time, recording the stage after every delivered timer.
        fn run(&mut self, by: Duration) -> Vec<&'static str> {
            let Self {
                voting,
                fall_rate,
                scheduler,
                ports,
                rng,
                ..
            } = self;
            let mut stages = Vec::new();
            run_for(scheduler, by, |scheduler, timer| {
                voting.on_timer(timer, fall_rate, scheduler, ports, rng);
                stages.push(voting.is_vote_running());
            });
            stages
        }
    }

    #[test]
    fn first_round_sets_stage_and_candidates() {
        let mut h = Harness::new();
        assert_eq!(h.voting.is_vote_running(), "");

        h.first_round();
        assert_eq!(h.voting.is_vote_running(), "initialDisplay");
        assert_eq!(h.voting.round().candidates.len(), CANDIDATE_COUNT);
        assert_eq!(h.voting.countdown_value(), 10);
        assert!(matches!(
            h.outbox.messages().as_slice(),
            [OutboundMessage::ShowVotingSequence {
                sequence: VotingStage::InitialDisplay,
                ..
            }]
        ));
    }

    #[test]
    fn countdown_ticks_down_and_stops_at_zero() {
        let mut h = Harness::new();
        h.first_round();

        h.run(Duration::from_secs(1));
        assert_eq!(h.voting.countdown_value(), 9);

        h.run(Duration::from_secs(9));
        assert_eq!(h.voting.countdown_value(), 0);
        assert_eq!(
            h.scheduler
                .count(|t| matches!(t, SessionTimer::VotingTick { .. })),
            0
        );
        // The decision window is longer than the displayed countdown.
        assert_eq!(h.voting.is_vote_running(), "initialDisplay");
    }

    #[test]
    fn new_first_round_resets_countdown_and_tallies() {
        let mut h = Harness::new();
        h.first_round();
        h.voting.get_result(VoteOption::Option2);
        h.run(Duration::from_secs(3));
        assert_eq!(h.voting.countdown_value(), 7);

        h.first_round();
        assert_eq!(h.voting.countdown_value(), 10);
        assert!(h.voting.round().tallies.is_empty());
        // Only the new round's tick and window remain armed.
        assert_eq!(h.scheduler.count(|_| true), 2);
    }

    #[test]
    fn stale_round_timers_are_ignored() {
        let mut h = Harness::new();
        h.first_round();
        let stale = h.voting.round_epoch;
        h.first_round();

        h.voting.on_timer(
            SessionTimer::VotingTick { round_epoch: stale },
            &mut h.fall_rate,
            &mut h.scheduler,
            &h.ports,
            &mut h.rng,
        );
        h.voting.on_timer(
            SessionTimer::VotingWindow { round_epoch: stale },
            &mut h.fall_rate,
            &mut h.scheduler,
            &h.ports,
            &mut h.rng,
        );
        assert_eq!(h.voting.countdown_value(), 10);
        assert_eq!(h.voting.is_vote_running(), "initialDisplay");
    }

    #[test]
    fn fall_rate_majority_increases_once() {
        let mut h = Harness::new();
        h.first_round();
        h.voting.get_result(VoteOption::Option1);
        assert_eq!(h.decide(), Some(Decision::Category(VoteCategory::FallRate)));
        assert_eq!(h.voting.is_vote_running(), "fallRate");

        for _ in 0..3 {
            h.voting.get_result(VoteOption::Option1);
        }
        h.voting.get_result(VoteOption::Option2);
        h.outbox.clear();
        assert_eq!(h.decide(), Some(Decision::FallRate(6)));

        assert_eq!(
            h.outbox.messages(),
            vec![
                OutboundMessage::Decision {
                    result: VoteOption::Option1,
                },
                OutboundMessage::UpdateFallRate { level: 6 },
                OutboundMessage::HideVotingSequence,
            ]
        );
        assert_eq!(h.voting.is_vote_running(), "");
    }

    #[test]
    fn fall_rate_minority_decreases() {
        let mut h = Harness::new();
        h.first_round();
        h.decide();
        h.voting.get_result(VoteOption::Option2);
        assert_eq!(h.decide(), Some(Decision::FallRate(4)));
    }

    #[test]
    fn spawn_vote_broadcasts_chosen_candidate() {
        let mut h = Harness::new();
        h.first_round();
        let candidates = h.voting.round().candidates.clone();
        h.voting.get_result(VoteOption::Option2);
        assert_eq!(
            h.decide(),
            Some(Decision::Category(VoteCategory::TetrominoSelection))
        );
        assert_eq!(h.voting.round().candidates, candidates);

        h.voting.get_result(VoteOption::Option3);
        assert_eq!(h.decide(), Some(Decision::Spawn(candidates[2])));
        assert!(h.outbox.messages().contains(&OutboundMessage::VotedTetroToSpawn {
            tetromino: candidates[2],
        }));
    }

    #[test]
    fn ties_go_to_the_first_voted_option() {
        let mut h = Harness::new();
        h.first_round();
        h.voting.get_result(VoteOption::Option2);
        h.voting.get_result(VoteOption::Option1);
        h.voting.get_result(VoteOption::Option1);
        h.voting.get_result(VoteOption::Option2);
        assert_eq!(
            h.decide(),
            Some(Decision::Category(VoteCategory::TetrominoSelection))
        );
    }

    #[test]
    fn third_option_only_counts_in_piece_selection() {
        let mut h = Harness::new();
        h.first_round();
        assert!(!h.voting.get_result(VoteOption::Option3));
        assert!(h.voting.get_result(VoteOption::Option1));
    }

    #[test]
    fn votes_without_round_are_dropped() {
        let mut h = Harness::new();
        assert!(!h.voting.get_result(VoteOption::Option1));
        assert_eq!(h.decide(), None);
    }

    #[test]
    fn starting_twice_registers_one_periodic_timer() {
        let mut h = Harness::new();
        assert!(h.voting.start_voting_loop(&mut h.scheduler));
        assert!(!h.voting.start_voting_loop(&mut h.scheduler));
        assert_eq!(h.scheduler.registrations(), 1);
        assert_eq!(h.scheduler.repeating(), 1);
    }

    #[test]
    fn stopping_cancels_everything_and_is_idempotent() {
        let mut h = Harness::new();
        assert!(!h.voting.stop_voting_loop(&mut h.scheduler, &h.ports));

        h.voting.start_voting_loop(&mut h.scheduler);
        h.run(Duration::from_secs(45));
        assert_eq!(h.voting.is_vote_running(), "initialDisplay");

        assert!(h.voting.stop_voting_loop(&mut h.scheduler, &h.ports));
        assert!(h.scheduler.is_empty());
        assert_eq!(h.voting.is_vote_running(), "");
        assert!(!h.voting.stop_voting_loop(&mut h.scheduler, &h.ports));

        // A cycle delivery that raced the stop must not open a round.
        h.voting.on_timer(
            SessionTimer::VotingCycle { loop_epoch: 1 },
            &mut h.fall_rate,
            &mut h.scheduler,
            &h.ports,
            &mut h.rng,
        );
        assert_eq!(h.voting.is_vote_running(), "");
    }

    #[test]
    fn full_cycle_walks_stages_in_order() {
        let mut h = Harness::new();
        h.voting.start_voting_loop(&mut h.scheduler);

        let mut stages = vec![h.voting.is_vote_running()];
        stages.extend(h.run(Duration::from_secs(80)));
        stages.dedup();
        assert_eq!(stages, vec!["", "initialDisplay", "fallRate", ""]);

        // The next cycle starts a fresh first round.
        let next = h.run(Duration::from_secs(10));
        assert!(next.contains(&"initialDisplay"));
    }

    #[test]
    fn tick_and_window_are_configured_independently() {
        let mut h = Harness::new();
        h.voting = VotingCoordinator::new(VotingConfig {
            cycle_period: Duration::from_secs(20),
            window: Duration::from_secs(3),
            tick_interval: Duration::from_millis(500),
            countdown_start: 10,
        });
        h.first_round();
        h.run(Duration::from_millis(2500));
        assert_eq!(h.voting.countdown_value(), 5);
        h.run(Duration::from_millis(500));
        assert_eq!(h.voting.is_vote_running(), "fallRate");
        assert_eq!(h.voting.countdown_value(), 10);
    }
}
