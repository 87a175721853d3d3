//! Identifiers and value types shared by the session components.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Hard upper bound on the number of seats in an arena.
pub const MAX_PLAYERS: u8 = 4;

/// Seat index of an admitted player (`0..MAX_PLAYERS`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct PlayerId(u8);

impl PlayerId {
    /// Build a player id, returning `None` when `raw` is outside the seat range.
    pub fn new(raw: u8) -> Option<Self> {
        (raw < MAX_PLAYERS).then_some(Self(raw))
    }

    /// Raw seat index.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Every seat id in ascending order.
    pub fn all() -> impl Iterator<Item = PlayerId> {
        (0..MAX_PLAYERS).map(PlayerId)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Transport-assigned identifier of one WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Allocate a fresh random connection id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.simple().fmt(f)
    }
}

/// The seven falling piece shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum TetrominoType {
    /// Straight bar.
    I,
    /// J hook.
    J,
    /// L hook.
    L,
    /// Square.
    O,
    /// S skew.
    S,
    /// T junction.
    T,
    /// Z skew.
    Z,
}

impl TetrominoType {
    /// All piece types in declaration order.
    pub const ALL: [TetrominoType; 7] = [
        TetrominoType::I,
        TetrominoType::J,
        TetrominoType::L,
        TetrominoType::O,
        TetrominoType::S,
        TetrominoType::T,
        TetrominoType::Z,
    ];

    /// Draw a uniformly random piece type.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// Score of a single seat as shown on the scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerScore {
    /// Seat the score belongs to.
    pub player_id: PlayerId,
    /// Accumulated points, never negative.
    pub score: u64,
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn player_id_rejects_out_of_range_seats() {
        assert!(PlayerId::new(3).is_some());
        assert!(PlayerId::new(MAX_PLAYERS).is_none());
        assert_eq!(PlayerId::all().count(), MAX_PLAYERS as usize);
    }

    #[test]
    fn tetromino_serializes_as_letter() {
        let json = serde_json::to_string(&TetrominoType::J).unwrap();
        assert_eq!(json, "\"J\"");
        let parsed: TetrominoType = serde_json::from_str("\"Z\"").unwrap();
        assert_eq!(parsed, TetrominoType::Z);
    }

    #[test]
    fn random_draws_stay_within_known_pieces() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let piece = TetrominoType::random(&mut rng);
            assert!(TetrominoType::ALL.contains(&piece));
        }
    }
}
