use std::fmt;

use uuid::Uuid;

use crate::game::{NightAction, Phase, Role};

/// Failures surfaced by coordinator operations.
///
/// None of these leave partial state behind: every check runs before the room is mutated.
#[derive(Debug)]
pub enum CoordinatorError {
    /// No durable record (join) or no live session (game operations) for the room.
    RoomNotFound(Uuid),
    /// Join attempted while the room is at capacity.
    RoomFull { room_id: Uuid, max_players: usize },
    /// Game start below the minimum player count.
    InsufficientPlayers { required: usize, present: usize },
    /// Operation submitted outside the phase it is valid in.
    WrongPhase { current: Phase },
    /// Actor's role cannot perform the requested night action.
    RoleMismatch { role: Role, action: NightAction },
    /// Actor or target is not a participant of the room's game.
    PlayerNotFound(Uuid),
    /// Actor or target is dead.
    PlayerNotAlive(Uuid),
    /// Host-only operation requested by another connection.
    NotHost,
    /// Username empty or too long after trimming.
    InvalidUsername(String),
    /// Room directory lookup failed.
    Directory(anyhow::Error),
}

impl CoordinatorError {
    /// Stable machine-readable code sent to clients.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Self::RoomFull { .. } => "ROOM_FULL",
            Self::InsufficientPlayers { .. } => "INSUFFICIENT_PLAYERS",
            Self::WrongPhase { .. } => "WRONG_PHASE",
            Self::RoleMismatch { .. } => "ROLE_MISMATCH",
            Self::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            Self::PlayerNotAlive(_) => "PLAYER_NOT_ALIVE",
            Self::NotHost => "NOT_HOST",
            Self::InvalidUsername(_) => "INVALID_USERNAME",
            Self::Directory(_) => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for CoordinatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoomNotFound(room_id) => write!(f, "Room {room_id} does not exist"),
            Self::RoomFull {
                room_id,
                max_players,
            } => write!(f, "Room {room_id} is full ({max_players} players)"),
            Self::InsufficientPlayers { required, present } => {
                write!(f, "Need at least {required} players, {present} present")
            }
            Self::WrongPhase { current } => write!(f, "Not allowed during phase {current}"),
            Self::RoleMismatch { role, action } => {
                write!(f, "Role {role:?} cannot perform {action:?}")
            }
            Self::PlayerNotFound(player_id) => {
                write!(f, "Player {player_id} is not part of this game")
            }
            Self::PlayerNotAlive(player_id) => write!(f, "Player {player_id} is dead"),
            Self::NotHost => f.write_str("Only the host can do that"),
            Self::InvalidUsername(reason) => write!(f, "Invalid username: {reason}"),
            Self::Directory(err) => write!(f, "Room lookup failed: {err}"),
        }
    }
}

impl std::error::Error for CoordinatorError {}
