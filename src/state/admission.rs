//! Seat assignment for connections asking to play.

use std::collections::BTreeMap;

use crate::state::game::{ConnectionId, MAX_PLAYERS, PlayerId};

/// Outcome of an admission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The connection took a free seat.
    Admitted(PlayerId),
    /// The connection already held this seat.
    AlreadyAdmitted(PlayerId),
    /// No seat is free; the connection stays a spectator.
    Full,
}

/// Seats held by connected players, capped at the quorum.
#[derive(Debug, Clone)]
pub struct AdmissionQueue {
    quorum: usize,
    seats: BTreeMap<PlayerId, ConnectionId>,
}

impl AdmissionQueue {
    /// Build an empty queue. `quorum` is capped at [`MAX_PLAYERS`].
    pub fn new(quorum: usize) -> Self {
        Self {
            quorum: quorum.clamp(1, MAX_PLAYERS as usize),
            seats: BTreeMap::new(),
        }
    }

    /// Give `connection` the lowest free seat.
    pub fn admit(&mut self, connection: ConnectionId) -> Admission {
        if let Some(player) = self.player_for(connection) {
            return Admission::AlreadyAdmitted(player);
        }
        if self.is_full() {
            return Admission::Full;
        }
        match PlayerId::all()
            .take(self.quorum)
            .find(|id| !self.seats.contains_key(id))
        {
            Some(player) => {
                self.seats.insert(player, connection);
                Admission::Admitted(player)
            }
            None => Admission::Full,
        }
    }

    /// Free the seat held by `connection`, if any.
    pub fn remove(&mut self, connection: ConnectionId) -> Option<PlayerId> {
        let player = self.player_for(connection)?;
        self.seats.remove(&player);
        Some(player)
    }

    /// Seat held by `connection`.
    pub fn player_for(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.seats
            .iter()
            .find(|(_, held_by)| **held_by == connection)
            .map(|(player, _)| *player)
    }

    /// Seats still needed before the match can start.
    pub fn remaining(&self) -> usize {
        self.quorum.saturating_sub(self.seats.len())
    }

    /// Whether every seat up to the quorum is taken.
    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.quorum
    }

    /// Seats held.
    pub fn len(&self) -> usize {
        self.seats.len()
    }

    /// Whether no seat is held.
    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Seats needed to start a match.
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Free every seat.
    pub fn reset(&mut self) {
        self.seats.clear();
    }
}
