//! Tokio-backed [`Scheduler`] used by the running session.
//!
//! Each timer is a tokio task that sleeps and then posts a [`SessionCommand::Timer`] back to
//! the session channel. Tasks only hold a weak sender, so pending timers never keep the
//! session loop alive once every connection handle is gone.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tokio::{
    sync::mpsc::WeakUnboundedSender,
    task::AbortHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, trace};

use crate::state::{
    session::SessionCommand,
    timers::{Scheduler, SessionTimer, TimerId},
};

/// Spawns one task per timer and aborts it on cancellation.
pub struct TokioScheduler {
    commands: WeakUnboundedSender<SessionCommand>,
    timers: HashMap<TimerId, AbortHandle>,
    next_id: u64,
}

impl TokioScheduler {
    /// Scheduler delivering into the session command channel.
    pub fn new(commands: WeakUnboundedSender<SessionCommand>) -> Self {
        Self {
            commands,
            timers: HashMap::new(),
            next_id: 0,
        }
    }

    /// Number of timers that have not fired or been cancelled yet.
    pub fn active_count(&self) -> usize {
        self.timers
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Abort every pending timer.
    pub fn cancel_all(&mut self) {
        for (id, handle) in self.timers.drain() {
            handle.abort();
            trace!(?id, "timer cancelled (shutdown)");
        }
    }

    fn track(&mut self, handle: AbortHandle) -> TimerId {
        self.timers.retain(|_, handle| !handle.is_finished());
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.insert(id, handle);
        id
    }
}

impl Scheduler for TokioScheduler {
    fn now(&self) -> Instant {
        time::Instant::now().into_std()
    }

    fn schedule_once(&mut self, delay: Duration, timer: SessionTimer) -> TimerId {
        let commands = self.commands.clone();
        let handle = tokio::spawn(async move {
            time::sleep(delay).await;
            trace!(?timer, "timer fired");
            deliver(&commands, timer);
        });
        let id = self.track(handle.abort_handle());
        debug!(?id, ?timer, ?delay, "timer set");
        id
    }

    fn schedule_repeating(&mut self, period: Duration, timer: SessionTimer) -> TimerId {
        let commands = self.commands.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !deliver(&commands, timer) {
                    break;
                }
            }
        });
        let id = self.track(handle.abort_handle());
        debug!(?id, ?timer, ?period, "repeating timer set");
        id
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(handle) = self.timers.remove(&id) {
            handle.abort();
            debug!(?id, "timer cancelled");
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Post `timer` to the session; `false` once the session is gone.
fn deliver(commands: &WeakUnboundedSender<SessionCommand>, timer: SessionTimer) -> bool {
    commands
        .upgrade()
        .is_some_and(|tx| tx.send(SessionCommand::Timer(timer)).is_ok())
}
