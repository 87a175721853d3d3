//! Scheduling seam between the session and whatever drives time.
//!
//! Components ask a [`Scheduler`] for one-shot or repeating [`SessionTimer`] deliveries and
//! keep the returned [`TimerId`] so they can cancel it. Every timer also carries the epoch,
//! generation or phase version it was armed for; receivers compare it on arrival, so a timer
//! that slips through cancellation cannot touch newer state.

use std::time::{Duration, Instant};

/// Handle to a scheduled timer, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Timer payloads delivered back to the session loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTimer {
    /// Periodic start of a new first voting round.
    VotingCycle {
        /// Voting loop the cycle belongs to.
        loop_epoch: u64,
    },
    /// One countdown step of the live voting round.
    VotingTick {
        /// Round the tick belongs to.
        round_epoch: u64,
    },
    /// End of the decision window of the live voting round.
    VotingWindow {
        /// Round the window belongs to.
        round_epoch: u64,
    },
    /// Inactivity deadline check.
    Watchdog {
        /// Watchdog the deadline belongs to.
        generation: u64,
    },
    /// End of the post-game grace delay.
    ReturnToWaitingRoom {
        /// Phase version when the grace started.
        phase_version: u64,
    },
}

/// Source of time and delayed deliveries for the session.
pub trait Scheduler {
    /// Current instant as seen by this scheduler.
    fn now(&self) -> Instant;

    /// Deliver `timer` once after `delay`.
    fn schedule_once(&mut self, delay: Duration, timer: SessionTimer) -> TimerId;

    /// Deliver `timer` every `period`, first delivery one period from now.
    fn schedule_repeating(&mut self, period: Duration, timer: SessionTimer) -> TimerId;

    /// Cancel a pending timer. Unknown or already fired ids are ignored.
    fn cancel(&mut self, id: TimerId);
}

/// Cancel the timer stored in `slot`, if any.
pub fn cancel_slot<S: Scheduler + ?Sized>(scheduler: &mut S, slot: &mut Option<TimerId>) {
    if let Some(id) = slot.take() {
        scheduler.cancel(id);
    }
}
