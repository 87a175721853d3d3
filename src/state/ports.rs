//! Output side of the session: the transport seam and its typed wrapper.

use std::sync::Arc;

use crate::{
    dto::ws::{JoinRejectReason, OutboundMessage, PlayerMovePayload, PlayerPlacePayload},
    state::{
        game::{ConnectionId, PlayerId, PlayerScore, TetrominoType},
        trade::PairingMode,
        voting::{VoteOption, VotingStage},
    },
};

/// Delivery surface the session pushes events into.
///
/// The session never holds sockets; the transport implements this trait.
pub trait Outbox: Send + Sync {
    /// Send `message` to every connection.
    fn broadcast(&self, message: &OutboundMessage);

    /// Send `message` to every connection except `excluded`.
    fn broadcast_except(&self, excluded: ConnectionId, message: &OutboundMessage);

    /// Send `message` to a single connection.
    fn send_to(&self, connection: ConnectionId, message: &OutboundMessage);
}

/// Typed output ports, one method per event kind, shared by all session components.
#[derive(Clone)]
pub struct SessionPorts {
    outbox: Arc<dyn Outbox>,
}

impl SessionPorts {
    /// Wrap an outbox.
    pub fn new(outbox: Arc<dyn Outbox>) -> Self {
        Self { outbox }
    }

    /// Broadcast the current scores.
    pub fn update_scoreboard(&self, scores: Vec<PlayerScore>) {
        self.outbox
            .broadcast(&OutboundMessage::UpdateScoreboard { scores });
    }

    /// Switch every client to the waiting room.
    pub fn to_scene_waiting_room(&self) {
        self.outbox.broadcast(&OutboundMessage::ToSceneWaitingRoom);
    }

    /// Switch every client to the arena.
    pub fn to_scene_game_arena(&self) {
        self.outbox.broadcast(&OutboundMessage::ToSceneGameArena);
    }

    /// Switch every client to the game-over standings.
    pub fn to_scene_game_over(&self, scores: Vec<PlayerScore>) {
        self.outbox
            .broadcast(&OutboundMessage::ToSceneGameOver { scores });
    }

    /// Switch every client to the fullscreen scoreboard.
    pub fn to_scene_fullscreen_scoreboard(&self, scores: Vec<PlayerScore>) {
        self.outbox
            .broadcast(&OutboundMessage::ToSceneFullscreenScoreboard { scores });
    }

    /// Broadcast how many seats are still open.
    pub fn remaining_players(&self, count: usize) {
        self.outbox
            .broadcast(&OutboundMessage::UpdateRemainingPlayers { count });
    }

    /// Broadcast the fall-rate level.
    pub fn fall_rate(&self, level: u32) {
        self.outbox
            .broadcast(&OutboundMessage::UpdateFallRate { level });
    }

    /// Broadcast a voting stage opening.
    pub fn show_voting_sequence(&self, sequence: VotingStage, candidates: &[TetrominoType]) {
        self.outbox
            .broadcast(&voting_sequence_message(sequence, candidates));
    }

    /// Close the voting overlay everywhere.
    pub fn hide_voting_sequence(&self) {
        self.outbox.broadcast(&OutboundMessage::HideVotingSequence);
    }

    /// Broadcast the winner of a stage.
    pub fn decision(&self, result: VoteOption) {
        self.outbox.broadcast(&OutboundMessage::Decision { result });
    }

    /// Broadcast the piece the audience picked.
    pub fn voted_tetro_to_spawn(&self, tetromino: TetrominoType) {
        self.outbox
            .broadcast(&OutboundMessage::VotedTetroToSpawn { tetromino });
    }

    /// Hand a traded piece to one connection, using the event name of the trade channel.
    pub fn trade_piece(&self, to: ConnectionId, mode: PairingMode, tetromino: TetrominoType) {
        let message = match mode {
            PairingMode::Regular => OutboundMessage::SendTradePiece { tetromino },
            PairingMode::Random { .. } => OutboundMessage::SendRandomPiece { tetromino },
        };
        self.outbox.send_to(to, &message);
    }

    /// Forward a move to everyone but its sender.
    pub fn relay_move(&self, from: ConnectionId, payload: PlayerMovePayload) {
        self.outbox
            .broadcast_except(from, &OutboundMessage::PlayerMove(payload));
    }

    /// Forward a placement to everyone but its sender.
    pub fn relay_place(&self, from: ConnectionId, payload: PlayerPlacePayload) {
        self.outbox
            .broadcast_except(from, &OutboundMessage::PlayerPlace(payload));
    }

    /// Tell a joiner its seat.
    pub fn init_player(&self, to: ConnectionId, player_id: PlayerId) {
        self.outbox
            .send_to(to, &OutboundMessage::InitPlayer { player_id });
    }

    /// Refuse a join.
    pub fn join_rejected(&self, to: ConnectionId, reason: JoinRejectReason) {
        self.outbox
            .send_to(to, &OutboundMessage::JoinRejected { reason });
    }

    /// Answer a single connection with an arbitrary message.
    pub fn reply(&self, to: ConnectionId, message: OutboundMessage) {
        self.outbox.send_to(to, &message);
    }
}

/// Build the `showVotingSequence` event for a stage and its candidates.
pub fn voting_sequence_message(
    sequence: VotingStage,
    candidates: &[TetrominoType],
) -> OutboundMessage {
    OutboundMessage::ShowVotingSequence {
        sequence,
        candidates: candidates.to_vec(),
    }
}
