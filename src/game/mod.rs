//! Game phase state machine for werewolf rooms.
//!
//! This module holds the value types (phases, roles, actions) and the pure rules: role
//! distribution, the `(phase, role, action) → effect` table, vote tallying and win
//! evaluation. The mutating operations that apply these rules to a live room live in
//! [`controller`].

pub mod controller;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coordinator::CoordinatorError;

/// Fewest players a game may start with.
pub const DEFAULT_MIN_PLAYERS: usize = 3;

/// Length of a NIGHT, DAY or VOTING phase before the phase clock advances it.
pub const DEFAULT_PHASE_DURATION: Duration = Duration::from_secs(60);

/// Phase of a room's game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Waiting,
    Night,
    Day,
    Voting,
    GameOver,
}

impl Phase {
    /// The phase that follows this one in the regular cycle.
    ///
    /// `Waiting` is left only through game start and `GameOver` is terminal, so both
    /// return `None`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Night => Some(Self::Day),
            Self::Day => Some(Self::Voting),
            Self::Voting => Some(Self::Night),
            Self::Waiting | Self::GameOver => None,
        }
    }

    /// Whether a game is underway (roles assigned, no winner yet).
    #[must_use]
    pub const fn in_progress(self) -> bool {
        matches!(self, Self::Night | Self::Day | Self::Voting)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Night => "NIGHT",
            Self::Day => "DAY",
            Self::Voting => "VOTING",
            Self::GameOver => "GAME_OVER",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Werewolf,
    Seer,
    Villager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    #[default]
    Alive,
    Dead,
}

/// Action submitted by a player during the night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NightAction {
    Kill,
    Investigate,
}

impl FromStr for NightAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KILL" => Ok(Self::Kill),
            "INVESTIGATE" => Ok(Self::Investigate),
            other => Err(format!("Unknown night action '{other}'")),
        }
    }
}

/// What a legal night action does to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NightEffect {
    /// The target dies.
    Kill,
    /// The target's role is revealed privately to the actor.
    Reveal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Winner {
    Villagers,
    Werewolves,
}

/// Tunables for starting and pacing a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameSettings {
    pub min_players: usize,
    pub phase_duration: Duration,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            min_players: DEFAULT_MIN_PLAYERS,
            phase_duration: DEFAULT_PHASE_DURATION,
        }
    }
}

/// Game portion of a room session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    pub phase: Phase,
    pub day_number: u32,
    pub phase_deadline: Option<Instant>,
    pub last_event: Option<String>,
    pub winner: Option<Winner>,
    /// Voter `player_id` → target `player_id` for the current voting round.
    pub votes: HashMap<Uuid, Uuid>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            phase: Phase::Waiting,
            day_number: 0,
            phase_deadline: None,
            last_event: None,
            winner: None,
            votes: HashMap::new(),
        }
    }
}

impl GameState {
    /// Whole seconds left on the phase timer, if one is running.
    #[must_use]
    pub fn time_remaining(&self, now: Instant) -> Option<u64> {
        self.phase_deadline
            .map(|deadline| deadline.saturating_duration_since(now).as_secs())
    }
}

/// Roles for a game of `player_count` players, in assignment order.
///
/// The first ⌊n/3⌋ are werewolves, the next one is the seer and everyone else is a
/// villager.
#[must_use]
pub fn role_distribution(player_count: usize) -> Vec<Role> {
    let werewolves = player_count / 3;
    (0..player_count)
        .map(|slot| {
            if slot < werewolves {
                Role::Werewolf
            } else if slot == werewolves {
                Role::Seer
            } else {
                Role::Villager
            }
        })
        .collect()
}

/// Resolve a night action against the rule table.
///
/// Every legal combination is listed explicitly; anything else in the night is a role
/// mismatch and anything outside the night is the wrong phase.
///
/// # Errors
///
/// Returns [`CoordinatorError::WrongPhase`] outside `Night` and
/// [`CoordinatorError::RoleMismatch`] when the actor's role cannot perform `action`.
pub fn night_effect(
    phase: Phase,
    role: Role,
    action: NightAction,
) -> Result<NightEffect, CoordinatorError> {
    match (phase, role, action) {
        (Phase::Night, Role::Werewolf, NightAction::Kill) => Ok(NightEffect::Kill),
        (Phase::Night, Role::Seer, NightAction::Investigate) => Ok(NightEffect::Reveal),
        (Phase::Night, _, _) => Err(CoordinatorError::RoleMismatch { role, action }),
        (current, _, _) => Err(CoordinatorError::WrongPhase { current }),
    }
}

/// Decide the winner from alive werewolf and alive non-werewolf counts.
#[must_use]
pub const fn evaluate_winner(alive_werewolves: usize, alive_others: usize) -> Option<Winner> {
    if alive_werewolves == 0 {
        Some(Winner::Villagers)
    } else if alive_werewolves >= alive_others {
        Some(Winner::Werewolves)
    } else {
        None
    }
}

/// The player with strictly the most votes, or `None` on a tie or an empty round.
#[must_use]
pub fn tally_votes(votes: &HashMap<Uuid, Uuid>) -> Option<Uuid> {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for target in votes.values() {
        *counts.entry(*target).or_default() += 1;
    }

    let top = counts.values().copied().max()?;
    let mut leaders = counts.iter().filter(|(_, count)| **count == top);
    let (leader, _) = leaders.next()?;
    if leaders.next().is_some() {
        return None;
    }
    Some(*leader)
}

/// Narrative line announced when a phase begins.
#[must_use]
pub const fn phase_narration(phase: Phase) -> &'static str {
    match phase {
        Phase::Waiting => "Waiting for players...",
        Phase::Night => "Night falls. Special roles act now.",
        Phase::Day => "The sun rises. Discuss and vote!",
        Phase::Voting => "Time to vote!",
        Phase::GameOver => "The game is over.",
    }
}
