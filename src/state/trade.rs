//! Piece trading between connections, on a regular and an anonymous channel.

use tracing::info;

use crate::state::{
    game::{ConnectionId, TetrominoType},
    ports::SessionPorts,
};

/// How a trade channel pairs offers and which event delivers the pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingMode {
    /// Two explicit offers swap pieces (`sendTradePiece`).
    Regular,
    /// Anonymous pool: any two successive offers swap (`sendRandomPiece`).
    Random {
        /// Configured pool size, published in the session snapshot but not enforced when pairing.
        pair_count: u32,
    },
}

/// An offer waiting for a counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeOffer {
    /// Connection that made the offer.
    pub offerer: ConnectionId,
    /// Piece handed over.
    pub tetromino: TetrominoType,
}

/// Result of submitting an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOutcome {
    /// Stored as the pending offer; nothing delivered yet.
    Pending,
    /// Swapped with the pending offer; both sides received the other's piece.
    Completed {
        /// The offer that was waiting.
        first: TradeOffer,
        /// The offer that completed the swap.
        second: TradeOffer,
    },
}

/// Two-party piece swap for one trade channel.
#[derive(Debug, Clone)]
pub struct TradeMatcher {
    mode: PairingMode,
    pending: Option<TradeOffer>,
}

impl TradeMatcher {
    /// Empty channel pairing offers according to `mode`.
    pub fn new(mode: PairingMode) -> Self {
        Self {
            mode,
            pending: None,
        }
    }

    /// Configured pool size in random mode, `None` for regular trades.
    pub fn pair_count(&self) -> Option<u32> {
        match self.mode {
            PairingMode::Regular => None,
            PairingMode::Random { pair_count } => Some(pair_count),
        }
    }

    /// Whether an offer is waiting for a counterpart.
    pub fn trade_active(&self) -> bool {
        self.pending.is_some()
    }

    /// Connection holding the pending offer.
    pub fn current_offerer(&self) -> Option<ConnectionId> {
        self.pending.map(|offer| offer.offerer)
    }

    /// Piece of the pending offer.
    pub fn current_trade_offer(&self) -> Option<TetrominoType> {
        self.pending.map(|offer| offer.tetromino)
    }

    /// Submit an offer. The second offer completes a swap with the pending one.
    ///
    /// The offering connections are not required to differ.
    pub fn add_trade(
        &mut self,
        connection: ConnectionId,
        tetromino: TetrominoType,
        ports: &SessionPorts,
    ) -> TradeOutcome {
        let second = TradeOffer {
            offerer: connection,
            tetromino,
        };
        let Some(first) = self.pending.take() else {
            self.pending = Some(second);
            return TradeOutcome::Pending;
        };

        ports.trade_piece(second.offerer, self.mode, first.tetromino);
        ports.trade_piece(first.offerer, self.mode, second.tetromino);
        self.clear_trade();
        info!(
            mode = ?self.mode,
            first = %first.offerer,
            second = %second.offerer,
            "trade completed"
        );
        TradeOutcome::Completed { first, second }
    }

    /// Drop the pending offer if `connection` made it.
    pub fn withdraw(&mut self, connection: ConnectionId) -> bool {
        if self.current_offerer() == Some(connection) {
            self.clear_trade();
            true
        } else {
            false
        }
    }

    /// Drop the pending offer.
    pub fn clear_trade(&mut self) {
        self.pending = None;
    }
}
