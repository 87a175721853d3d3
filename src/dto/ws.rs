//! WebSocket wire protocol: inbound commands and outbound events.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::CommandError,
    state::{
        game::{PlayerId, PlayerScore, TetrominoType},
        voting::{VoteOption, VotingStage},
    },
};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
/// Commands accepted from game and spectator WebSocket clients.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundMessage {
    /// Ask for a seat.
    Join,
    /// Falling piece moved.
    PlayerMove(PlayerMovePayload),
    /// Piece locked into the board.
    PlayerPlace(PlayerPlacePayload),
    /// Finish the match now.
    EndGame,
    /// Raw points earned by a seat.
    GainPoints(GainPointsPayload),
    /// Penalty for a seat.
    LosePoints(LosePointsPayload),
    /// Ballot for the live voting round.
    Vote {
        /// Chosen option.
        option: VoteOption,
    },
    /// Ask for the live voting round, if any.
    RequestVotingSequence,
    /// Offer a piece on the regular trade channel.
    AddTrade {
        /// Piece offered.
        tetromino: TetrominoType,
    },
    /// Offer a piece on the anonymous trade channel.
    AddRandomTrade {
        /// Piece offered.
        tetromino: TetrominoType,
    },
    /// Ask for the current scores.
    RequestScoreboardData,
    /// Ask which scene is up.
    RequestScene,
}

impl InboundMessage {
    /// Parse and validate a raw text frame.
    ///
    /// Nothing reaches the session unless both steps succeed, so a malformed frame is never
    /// partially applied.
    pub fn from_json_str(raw: &str) -> Result<Self, CommandError> {
        let message: Self = serde_json::from_str(raw)?;
        message.validate_payload()?;
        Ok(message)
    }

    fn validate_payload(&self) -> Result<(), CommandError> {
        match self {
            Self::PlayerMove(payload) => payload.validate()?,
            Self::PlayerPlace(payload) => payload.validate()?,
            Self::GainPoints(payload) => payload.validate()?,
            Self::LosePoints(payload) => payload.validate()?,
            _ => {}
        }
        Ok(())
    }

    /// Wire name of the command, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::PlayerMove(_) => "playerMove",
            Self::PlayerPlace(_) => "playerPlace",
            Self::EndGame => "endGame",
            Self::GainPoints(_) => "gainPoints",
            Self::LosePoints(_) => "losePoints",
            Self::Vote { .. } => "vote",
            Self::RequestVotingSequence => "requestVotingSequence",
            Self::AddTrade { .. } => "addTrade",
            Self::AddRandomTrade { .. } => "addRandomTrade",
            Self::RequestScoreboardData => "requestScoreboardData",
            Self::RequestScene => "requestScene",
        }
    }
}

/// Direction of a single player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum MoveDirection {
    /// One column left.
    Left,
    /// One column right.
    Right,
    /// Soft drop by one row.
    Down,
    /// Quarter turn.
    Rotate,
    /// Hard drop.
    Drop,
}

/// Position report of a falling piece, trusted as sent by the client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PiecePosition {
    /// Row and column of the piece origin on the board.
    pub tetro_position: [i32; 2],
    /// Quarter turns applied to the piece.
    #[validate(range(max = 3))]
    pub rotation: u8,
    /// Shape of the piece.
    pub tetro_type: TetrominoType,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// A player moved their falling piece.
pub struct PlayerMovePayload {
    /// Seat of the mover.
    #[validate(range(max = 3))]
    pub player_id: u8,
    /// Input applied.
    pub direction: MoveDirection,
    /// Piece position after the move.
    #[validate(nested)]
    pub position: PiecePosition,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// A player locked their piece into the board.
pub struct PlayerPlacePayload {
    /// Seat of the placer.
    #[validate(range(max = 3))]
    pub player_id: u8,
    /// Final piece position.
    #[validate(nested)]
    pub position: PiecePosition,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// A player cleared lines and earns raw points.
pub struct GainPointsPayload {
    /// Seat credited.
    #[validate(range(max = 3))]
    pub player_id: u8,
    /// Raw points before level scaling.
    #[validate(range(max = 10_000))]
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
/// A player is penalised by the configured amount.
pub struct LosePointsPayload {
    /// Seat penalised.
    #[validate(range(max = 3))]
    pub player_id: u8,
}

/// Why an admission request was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum JoinRejectReason {
    /// Every seat is taken; the connection stays a spectator.
    Full,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
/// Events pushed from the session to WebSocket clients.
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    /// Scores changed.
    UpdateScoreboard {
        /// Scores ordered by player id.
        scores: Vec<PlayerScore>,
    },
    /// Show the waiting room.
    ToSceneWaitingRoom,
    /// Show the arena.
    ToSceneGameArena,
    /// Show final standings.
    ToSceneGameOver {
        /// Standings, best first.
        scores: Vec<PlayerScore>,
    },
    /// Show the fullscreen scoreboard.
    ToSceneFullscreenScoreboard {
        /// Standings, best first.
        scores: Vec<PlayerScore>,
    },
    /// Seats still needed before the match starts.
    UpdateRemainingPlayers {
        /// Open seats.
        count: usize,
    },
    /// Fall-rate level changed.
    UpdateFallRate {
        /// New level.
        level: u32,
    },
    /// A voting stage opened.
    ShowVotingSequence {
        /// Stage on display.
        sequence: VotingStage,
        /// Pieces offered, empty outside piece selection.
        candidates: Vec<TetrominoType>,
    },
    /// The voting overlay closes.
    HideVotingSequence,
    /// Winning option of a closed stage.
    Decision {
        /// Winner.
        result: VoteOption,
    },
    /// The audience picked the next piece.
    VotedTetroToSpawn {
        /// Piece to spawn.
        tetromino: TetrominoType,
    },
    /// Piece received through a regular trade.
    SendTradePiece {
        /// Piece received.
        tetromino: TetrominoType,
    },
    /// Piece received through the anonymous trade channel.
    SendRandomPiece {
        /// Piece received.
        tetromino: TetrominoType,
    },
    /// Seat assigned to the joiner.
    InitPlayer {
        /// Assigned seat.
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    /// Join refused.
    JoinRejected {
        /// Why the seat was refused.
        reason: JoinRejectReason,
    },
    /// Frame refused at the boundary.
    CommandRejected {
        /// Parse or validation error.
        message: String,
    },
    /// Relayed move of another player.
    PlayerMove(PlayerMovePayload),
    /// Relayed placement of another player.
    PlayerPlace(PlayerPlacePayload),
}
