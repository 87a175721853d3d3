//! Deterministic doubles for the scheduler and outbox, used by unit tests.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use crate::{
    dto::ws::OutboundMessage,
    state::{
        game::ConnectionId,
        ports::{Outbox, SessionPorts},
        timers::{Scheduler, SessionTimer, TimerId},
    },
};

/// Who a recorded message was addressed to.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    All,
    AllExcept(ConnectionId),
    One(ConnectionId),
}

/// Outbox that keeps every message in memory.
#[derive(Default)]
pub struct RecordingOutbox {
    sent: Mutex<Vec<(Target, OutboundMessage)>>,
}

impl RecordingOutbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn ports(self: &Arc<Self>) -> SessionPorts {
        SessionPorts::new(self.clone())
    }

    pub fn take(&self) -> Vec<(Target, OutboundMessage)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn sent_to(&self, connection: ConnectionId) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _)| *target == Target::One(connection))
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn push(&self, target: Target, message: &OutboundMessage) {
        self.sent.lock().unwrap().push((target, message.clone()));
    }
}

impl Outbox for RecordingOutbox {
    fn broadcast(&self, message: &OutboundMessage) {
        self.push(Target::All, message);
    }

    fn broadcast_except(&self, excluded: ConnectionId, message: &OutboundMessage) {
        self.push(Target::AllExcept(excluded), message);
    }

    fn send_to(&self, connection: ConnectionId, message: &OutboundMessage) {
        self.push(Target::One(connection), message);
    }
}

#[derive(Debug)]
struct Pending {
    id: TimerId,
    due: Instant,
    period: Option<Duration>,
    timer: SessionTimer,
}

/// Virtual clock scheduler; timers only fire when a test pops them.
#[derive(Debug)]
pub struct ManualScheduler {
    now: Instant,
    next_id: u64,
    pending: Vec<Pending>,
    registrations: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            now: Instant::now(),
            next_id: 0,
            pending: Vec::new(),
            registrations: 0,
        }
    }

    /// Total number of `schedule_*` calls so far.
    pub fn registrations(&self) -> usize {
        self.registrations
    }

    /// Number of live repeating timers.
    pub fn repeating(&self) -> usize {
        self.pending.iter().filter(|p| p.period.is_some()).count()
    }

    /// Number of live timers matching `pred`.
    pub fn count(&self, pred: impl Fn(&SessionTimer) -> bool) -> usize {
        self.pending.iter().filter(|p| pred(&p.timer)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pop the earliest timer due at or before `until`, advancing the clock to it.
    pub fn pop_due(&mut self, until: Instant) -> Option<SessionTimer> {
        let index = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, p)| p.due <= until)
            .min_by_key(|(_, p)| (p.due, p.id))
            .map(|(index, _)| index)?;

        let due = self.pending[index].due;
        self.now = self.now.max(due);
        let timer = self.pending[index].timer;
        match self.pending[index].period {
            Some(period) => self.pending[index].due = due + period,
            None => {
                self.pending.remove(index);
            }
        }
        Some(timer)
    }

    /// Move the clock forward without firing anything.
    pub fn set_now(&mut self, now: Instant) {
        self.now = self.now.max(now);
    }

    fn register(
        &mut self,
        delay: Duration,
        period: Option<Duration>,
        timer: SessionTimer,
    ) -> TimerId {
        self.next_id += 1;
        self.registrations += 1;
        let id = TimerId(self.next_id);
        self.pending.push(Pending {
            id,
            due: self.now + delay,
            period,
            timer,
        });
        id
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> Instant {
        self.now
    }

    fn schedule_once(&mut self, delay: Duration, timer: SessionTimer) -> TimerId {
        self.register(delay, None, timer)
    }

    fn schedule_repeating(&mut self, period: Duration, timer: SessionTimer) -> TimerId {
        self.register(period, Some(period), timer)
    }

    fn cancel(&mut self, id: TimerId) {
        self.pending.retain(|p| p.id != id);
    }
}

/// Fire every timer due within `by`, handing each to `handle` in due order.
pub fn run_for(
    scheduler: &mut ManualScheduler,
    by: Duration,
    mut handle: impl FnMut(&mut ManualScheduler, SessionTimer),
) {
    let target = scheduler.now() + by;
    while let Some(timer) = scheduler.pop_due(target) {
        handle(scheduler, timer);
    }
    scheduler.set_now(target);
}
