//! Phase machine: scenes of the session and the events that move between them.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Top-level scene of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    /// Players are joining; nothing is running.
    WaitingRoom,
    /// A match is live; voting and the inactivity watchdog run.
    Arena,
    /// Final standings are shown before returning to the waiting room.
    GameOver,
    /// Alternate final display reached on a score milestone.
    FullscreenScoreboard,
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// A connection sent `endGame`.
    Requested,
    /// The inactivity watchdog expired.
    Inactivity,
}

/// Events that can be applied to the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The admission queue reached quorum.
    QuorumReached,
    /// The match ended.
    EndGame(EndReason),
    /// The best final score reached the configured milestone.
    ScoreMilestone,
    /// The post-game grace delay elapsed.
    GraceElapsed,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Snapshot of the phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase.
    pub phase: SessionPhase,
    /// Incremented on every transition.
    pub version: u64,
}

/// Phase machine of the session; transitions are the only way state resets.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: SessionPhase,
    version: u64,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::WaitingRoom,
            version: 0,
        }
    }
}

impl PhaseMachine {
    /// Create a new machine in the waiting room.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Transitions applied so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Phase and version together.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
        }
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        self.phase = self.compute_transition(event)?;
        self.version += 1;
        Ok(self.phase)
    }

    fn compute_transition(&self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::WaitingRoom, SessionEvent::QuorumReached) => SessionPhase::Arena,
            (SessionPhase::Arena, SessionEvent::EndGame(_)) => SessionPhase::GameOver,
            (SessionPhase::GameOver, SessionEvent::ScoreMilestone) => {
                SessionPhase::FullscreenScoreboard
            }
            (
                SessionPhase::GameOver | SessionPhase::FullscreenScoreboard,
                SessionEvent::GraceElapsed,
            ) => SessionPhase::WaitingRoom,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
