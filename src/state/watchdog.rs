//! Arena inactivity watchdog: ends the match when no player input arrives in time.

use std::time::{Duration, Instant};

use crate::state::timers::{Scheduler, SessionTimer, TimerId, cancel_slot};

/// What a watchdog timer delivery amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogCheck {
    /// Delivery belongs to an older watchdog or one that already fired.
    Stale,
    /// The watchdog was fed in time; a new deadline was armed.
    Rearmed,
    /// No activity within the timeout. Reported once per watchdog.
    Expired,
}

/// Inactivity timer for one arena lifetime.
///
/// Feeding only records the time; the single armed timer re-checks the deadline when it
/// fires and re-arms for the remainder, so frequent feeds never churn timers.
#[derive(Debug)]
pub struct InactivityWatchdog {
    generation: u64,
    timeout: Duration,
    last_fed_at: Instant,
    timer: Option<TimerId>,
    expired: bool,
}

impl InactivityWatchdog {
    /// Create a watchdog fed at creation time and arm its first deadline.
    pub fn start<S: Scheduler + ?Sized>(
        generation: u64,
        timeout: Duration,
        scheduler: &mut S,
    ) -> Self {
        let timer = scheduler.schedule_once(timeout, SessionTimer::Watchdog { generation });
        Self {
            generation,
            timeout,
            last_fed_at: scheduler.now(),
            timer: Some(timer),
            expired: false,
        }
    }

    /// Record activity at `now`.
    pub fn feed(&mut self, now: Instant) {
        if !self.expired {
            self.last_fed_at = self.last_fed_at.max(now);
        }
    }

    /// Handle a watchdog delivery carrying `generation`.
    pub fn check<S: Scheduler + ?Sized>(
        &mut self,
        generation: u64,
        scheduler: &mut S,
    ) -> WatchdogCheck {
        if generation != self.generation || self.expired {
            return WatchdogCheck::Stale;
        }
        self.timer = None;

        let deadline = self.last_fed_at + self.timeout;
        let now = scheduler.now();
        if now >= deadline {
            self.expired = true;
            return WatchdogCheck::Expired;
        }

        self.timer = Some(scheduler.schedule_once(
            deadline.saturating_duration_since(now),
            SessionTimer::Watchdog { generation },
        ));
        WatchdogCheck::Rearmed
    }

    /// Cancel the armed deadline; the watchdog is unusable afterwards.
    pub fn discard<S: Scheduler + ?Sized>(mut self, scheduler: &mut S) {
        cancel_slot(scheduler, &mut self.timer);
    }
}
