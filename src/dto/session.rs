//! HTTP view of the session state.

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{game::PlayerScore, state_machine::SessionPhase, voting::VotingStage};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Read-only view of the session, refreshed after every processed command.
pub struct SessionSnapshot {
    /// Current scene.
    pub phase: SessionPhase,
    /// Number of phase transitions so far.
    pub version: u64,
    /// RFC 3339 timestamp of the last transition.
    pub phase_since: String,
    /// Players needed to start a match.
    pub quorum: usize,
    /// Seats currently held.
    pub players: usize,
    /// Seats still needed before the match starts.
    pub remaining_players: usize,
    /// Fall-rate level.
    pub level: u32,
    /// Scores ordered by player id.
    pub scores: Vec<PlayerScore>,
    /// Live voting stage, empty string when idle.
    pub vote_stage: VotingStage,
    /// Countdown of the live round.
    pub countdown: u32,
    /// Whether a regular trade offer is waiting for a counterpart.
    pub trade_active: bool,
    /// Whether a random-pool offer is waiting for a counterpart.
    pub random_trade_active: bool,
    /// Pool size of the anonymous trade channel.
    pub random_trade_pair_count: u32,
}
