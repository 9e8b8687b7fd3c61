//! Game operations applied to a locked [`RoomSession`].
//!
//! Each operation validates first and mutates second, so a failed call leaves the room
//! untouched. Callers hold the room's lock for the whole call.

use std::collections::HashMap;
use std::time::Instant;

use rand::Rng;
use rand::seq::SliceRandom;
use uuid::Uuid;

use super::{
    GameSettings, GameState, NightAction, NightEffect, Phase, PlayerStatus, Role, Winner,
    evaluate_winner, night_effect, phase_narration, role_distribution, tally_votes,
};
use crate::coordinator::CoordinatorError;
use crate::sessions::{ConnectionId, PlayerPresence, RoomSession};

/// Result of a legal night action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NightOutcome {
    /// Target died; `winner` is set if the kill ended the game.
    Killed {
        target_id: Uuid,
        winner: Option<Winner>,
    },
    /// Target's role, to be delivered privately to the seer's connection.
    Revealed {
        seer_connection: ConnectionId,
        target_id: Uuid,
        role: Role,
    },
}

/// Result of a phase change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseChange {
    pub from: Phase,
    pub to: Phase,
    /// Player eliminated by the vote tally when leaving `Voting`.
    pub eliminated: Option<Uuid>,
    pub winner: Option<Winner>,
}

impl RoomSession {
    /// Assign roles and move from `Waiting` to `Night`.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::WrongPhase`] unless the room is waiting,
    /// [`CoordinatorError::InsufficientPlayers`] below `settings.min_players`.
    pub fn start_game<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        settings: &GameSettings,
        now: Instant,
    ) -> Result<Option<Winner>, CoordinatorError> {
        if self.game.phase != Phase::Waiting {
            return Err(CoordinatorError::WrongPhase {
                current: self.game.phase,
            });
        }
        let present = self.players.len();
        if present < settings.min_players {
            return Err(CoordinatorError::InsufficientPlayers {
                required: settings.min_players,
                present,
            });
        }

        // Sort before shuffling so a seeded rng reproduces the same assignment.
        let mut order: Vec<ConnectionId> = self.players.keys().cloned().collect();
        order.sort();
        order.shuffle(rng);

        for (connection_id, role) in order.iter().zip(role_distribution(present)) {
            if let Some(player) = self.players.get_mut(connection_id) {
                player.role = Some(role);
                player.status = PlayerStatus::Alive;
            }
        }

        self.game = GameState {
            phase: Phase::Night,
            day_number: 0,
            phase_deadline: Some(now + settings.phase_duration),
            last_event: Some("Game started! Night falls...".to_string()),
            winner: None,
            votes: HashMap::new(),
        };
        self.last_activity = now;

        tracing::info!(
            room_id = %self.room_id,
            players = present,
            werewolves = present / 3,
            "Game started"
        );

        Ok(self.settle_winner())
    }

    /// Apply a night action through the rule table.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::WrongPhase`] outside `Night`,
    /// [`CoordinatorError::PlayerNotFound`] / [`CoordinatorError::PlayerNotAlive`] for
    /// actor or target, [`CoordinatorError::RoleMismatch`] when the role cannot act.
    pub fn apply_night_action(
        &mut self,
        actor_id: Uuid,
        target_id: Uuid,
        action: NightAction,
    ) -> Result<NightOutcome, CoordinatorError> {
        if self.game.phase != Phase::Night {
            return Err(CoordinatorError::WrongPhase {
                current: self.game.phase,
            });
        }

        let (actor_role, seer_connection) = {
            let actor = self.living_participant(actor_id)?;
            (actor.role, actor.connection_id.clone())
        };
        let target_role = self.living_participant(target_id)?.role;

        let (Some(actor_role), Some(target_role)) = (actor_role, target_role) else {
            return Err(CoordinatorError::PlayerNotFound(actor_id));
        };

        match night_effect(self.game.phase, actor_role, action)? {
            NightEffect::Kill => {
                let mut victim = None;
                if let Some(target) = self.player_by_id_mut(target_id) {
                    target.status = PlayerStatus::Dead;
                    victim = Some(target.username.clone());
                }
                let victim = victim.unwrap_or_default();
                self.game.last_event = Some(format!("{victim} was killed during the night..."));
                tracing::info!(room_id = %self.room_id, %actor_id, %target_id, "Night kill");

                Ok(NightOutcome::Killed {
                    target_id,
                    winner: self.settle_winner(),
                })
            }
            NightEffect::Reveal => {
                tracing::debug!(room_id = %self.room_id, %actor_id, %target_id, "Seer investigation");
                Ok(NightOutcome::Revealed {
                    seer_connection,
                    target_id,
                    role: target_role,
                })
            }
        }
    }

    /// Record (or replace) a vote for the current round. Returns the number of votes cast.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::WrongPhase`] outside `Voting`,
    /// [`CoordinatorError::PlayerNotFound`] / [`CoordinatorError::PlayerNotAlive`] for
    /// voter or target.
    pub fn record_vote(&mut self, voter_id: Uuid, target_id: Uuid) -> Result<usize, CoordinatorError> {
        if self.game.phase != Phase::Voting {
            return Err(CoordinatorError::WrongPhase {
                current: self.game.phase,
            });
        }
        self.living_participant(voter_id)?;
        self.living_participant(target_id)?;

        self.game.votes.insert(voter_id, target_id);
        Ok(self.game.votes.len())
    }

    /// Advance to `new_phase`, which must follow the current phase in the cycle.
    ///
    /// Leaving `Voting` tallies the round first. The win condition is evaluated last.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::WrongPhase`] when `new_phase` is not the successor (this
    /// includes every request made in `Waiting` or `GameOver`).
    pub fn change_phase(
        &mut self,
        new_phase: Phase,
        settings: &GameSettings,
        now: Instant,
    ) -> Result<PhaseChange, CoordinatorError> {
        let from = self.game.phase;
        if from.next() != Some(new_phase) {
            return Err(CoordinatorError::WrongPhase { current: from });
        }

        let mut narration = Vec::new();
        let mut eliminated = None;
        if from == Phase::Voting {
            match tally_votes(&self.game.votes) {
                Some(target_id) => {
                    if let Some(target) = self.player_by_id_mut(target_id) {
                        target.status = PlayerStatus::Dead;
                        narration.push(format!("{} was voted out by the village.", target.username));
                        eliminated = Some(target_id);
                    }
                }
                None => narration.push("The village could not agree on anyone.".to_string()),
            }
            self.game.votes.clear();
        }

        self.game.phase = new_phase;
        self.game.phase_deadline = Some(now + settings.phase_duration);
        if new_phase == Phase::Day {
            self.game.day_number += 1;
        }
        narration.push(phase_narration(new_phase).to_string());
        self.game.last_event = Some(narration.join(" "));
        self.last_activity = now;

        tracing::info!(
            room_id = %self.room_id,
            %from,
            to = %new_phase,
            day = self.game.day_number,
            ?eliminated,
            "Phase changed"
        );

        Ok(PhaseChange {
            from,
            to: new_phase,
            eliminated,
            winner: self.settle_winner(),
        })
    }

    /// Successor phase if the running phase timer has expired at `now`.
    #[must_use]
    pub fn expired_phase(&self, now: Instant) -> Option<Phase> {
        let deadline = self.game.phase_deadline?;
        if deadline > now {
            return None;
        }
        self.game.phase.next()
    }

    /// End the game if a side has won. Returns the winner only on the transition.
    ///
    /// Does nothing while waiting or once the game is already over, so it is safe to call
    /// after any mutation.
    pub fn settle_winner(&mut self) -> Option<Winner> {
        if !self.game.phase.in_progress() {
            return None;
        }

        let alive = self.players.values().filter(|p| p.is_alive());
        let (mut werewolves, mut others) = (0, 0);
        for player in alive {
            match player.role {
                Some(Role::Werewolf) => werewolves += 1,
                Some(Role::Seer | Role::Villager) => others += 1,
                None => {}
            }
        }

        let winner = evaluate_winner(werewolves, others)?;
        self.game.phase = Phase::GameOver;
        self.game.phase_deadline = None;
        self.game.winner = Some(winner);
        self.game.last_event = Some(
            match winner {
                Winner::Villagers => "All werewolves eliminated! Villagers win!",
                Winner::Werewolves => "Werewolves outnumber villagers! Werewolves win!",
            }
            .to_string(),
        );

        tracing::info!(room_id = %self.room_id, ?winner, werewolves, others, "Game over");
        Some(winner)
    }

    /// A present, alive player holding a role in the current game.
    fn living_participant(
        &self,
        player_id: Uuid,
    ) -> Result<&PlayerPresence, CoordinatorError> {
        let player = self
            .player_by_id(player_id)
            .filter(|p| p.is_participant())
            .ok_or(CoordinatorError::PlayerNotFound(player_id))?;
        if !player.is_alive() {
            return Err(CoordinatorError::PlayerNotAlive(player_id));
        }
        Ok(player)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn settings() -> GameSettings {
        GameSettings {
            min_players: 3,
            phase_duration: Duration::from_secs(60),
        }
    }

    /// Room with `n` players, `p0` … `p{n-1}`, joined one second apart.
    fn room_with(n: usize) -> (RoomSession, Vec<Uuid>) {
        let t0 = Instant::now();
        let mut room = RoomSession::new(Uuid::new_v4(), "Village".to_string(), t0);
        let mut ids = Vec::new();
        for i in 0..n {
            let player_id = Uuid::new_v4();
            room.add_player(
                format!("p{i}").into(),
                player_id,
                format!("Player {i}"),
                t0 + Duration::from_secs(i as u64),
            );
            ids.push(player_id);
        }
        (room, ids)
    }

    fn started(n: usize) -> RoomSession {
        let (mut room, _) = room_with(n);
        let result = room.start_game(&mut StdRng::seed_from_u64(7), &settings(), Instant::now());
        assert!(matches!(result, Ok(None)));
        room
    }

    fn with_role(room: &RoomSession, role: Role) -> Vec<Uuid> {
        room.players()
            .filter(|p| p.role == Some(role))
            .map(|p| p.player_id)
            .collect()
    }

    fn first_with_role(room: &RoomSession, role: Role) -> Uuid {
        with_role(room, role).first().copied().unwrap_or_default()
    }

    #[test]
    fn start_requires_minimum_players() {
        let (mut room, _) = room_with(2);
        let result = room.start_game(&mut rand::thread_rng(), &settings(), Instant::now());

        assert!(matches!(
            result,
            Err(CoordinatorError::InsufficientPlayers {
                required: 3,
                present: 2
            })
        ));
        assert_eq!(room.phase(), Phase::Waiting);
        assert!(room.players().all(|p| p.role.is_none()));
    }

    #[test]
    fn start_assigns_roles_and_enters_night() {
        for n in 3..=10 {
            let room = started(n);
            assert_eq!(room.phase(), Phase::Night);
            assert_eq!(with_role(&room, Role::Werewolf).len(), n / 3);
            assert_eq!(with_role(&room, Role::Seer).len(), 1);
            assert_eq!(with_role(&room, Role::Villager).len(), n - n / 3 - 1);
            assert!(room.game().phase_deadline.is_some());
            assert_eq!(
                room.game().last_event.as_deref(),
                Some("Game started! Night falls...")
            );
        }
    }

    #[test]
    fn start_twice_is_wrong_phase() {
        let mut room = started(4);
        let result = room.start_game(&mut rand::thread_rng(), &settings(), Instant::now());
        assert!(matches!(
            result,
            Err(CoordinatorError::WrongPhase {
                current: Phase::Night
            })
        ));
    }

    #[test]
    fn werewolf_kill_marks_target_dead() {
        let mut room = started(6);
        let wolf = first_with_role(&room, Role::Werewolf);
        let villager = first_with_role(&room, Role::Villager);

        let outcome = room.apply_night_action(wolf, villager, NightAction::Kill);
        assert!(matches!(outcome, Ok(NightOutcome::Killed { winner: None, .. })));
        assert_eq!(
            room.player_by_id(villager).map(|p| p.status),
            Some(PlayerStatus::Dead)
        );
    }

    #[test]
    fn seer_investigation_reveals_without_mutation() {
        let mut room = started(6);
        let seer = first_with_role(&room, Role::Seer);
        let wolf = first_with_role(&room, Role::Werewolf);
        let before: Vec<_> = room.players().map(|p| (p.player_id, p.status)).collect();

        let outcome = room.apply_night_action(seer, wolf, NightAction::Investigate);
        let Ok(NightOutcome::Revealed {
            target_id, role, ..
        }) = outcome
        else {
            unreachable!("seer investigation should reveal");
        };
        assert_eq!(target_id, wolf);
        assert_eq!(role, Role::Werewolf);

        let after: Vec<_> = room.players().map(|p| (p.player_id, p.status)).collect();
        assert_eq!(before.len(), after.len());
        assert!(before.iter().all(|entry| after.contains(entry)));
    }

    #[test]
    fn villager_cannot_kill() {
        let mut room = started(6);
        let villager = first_with_role(&room, Role::Villager);
        let wolf = first_with_role(&room, Role::Werewolf);

        let outcome = room.apply_night_action(villager, wolf, NightAction::Kill);
        assert!(matches!(outcome, Err(CoordinatorError::RoleMismatch { .. })));
        assert!(room.players().all(|p| p.is_alive()));
    }

    #[test]
    fn night_action_outside_night_is_wrong_phase() {
        let (mut room, ids) = room_with(3);
        let outcome = room.apply_night_action(ids[0], ids[1], NightAction::Kill);
        assert!(matches!(
            outcome,
            Err(CoordinatorError::WrongPhase {
                current: Phase::Waiting
            })
        ));
    }

    #[test]
    fn killing_every_werewolf_hands_villagers_the_win() {
        let mut room = started(6);
        let wolves = with_role(&room, Role::Werewolf);
        for wolf in &wolves {
            if let Some(p) = room.player_by_id_mut(*wolf) {
                p.status = PlayerStatus::Dead;
            }
        }

        assert_eq!(room.settle_winner(), Some(Winner::Villagers));
        assert_eq!(room.phase(), Phase::GameOver);
        assert_eq!(room.game().winner, Some(Winner::Villagers));
        assert_eq!(room.settle_winner(), None, "win is only reported once");
    }

    #[test]
    fn game_over_rejects_further_mutations() {
        let mut room = started(3);
        let wolf = first_with_role(&room, Role::Werewolf);
        let seer = first_with_role(&room, Role::Seer);
        let result = room.apply_night_action(wolf, seer, NightAction::Kill);
        assert!(matches!(
            result,
            Ok(NightOutcome::Killed {
                winner: Some(Winner::Werewolves),
                ..
            })
        ));

        let now = Instant::now();
        assert!(room.change_phase(Phase::Day, &settings(), now).is_err());
        assert!(room.record_vote(wolf, seer).is_err());
        assert!(room.apply_night_action(wolf, seer, NightAction::Kill).is_err());
        assert!(room.start_game(&mut rand::thread_rng(), &settings(), now).is_err());
        assert_eq!(room.phase(), Phase::GameOver);
    }

    #[test]
    fn phase_cycle_and_day_counter() {
        let mut room = started(6);
        let now = Instant::now();

        let change = room.change_phase(Phase::Day, &settings(), now);
        assert!(change.is_ok_and(|c| c.from == Phase::Night && c.to == Phase::Day));
        assert_eq!(room.game().day_number, 1);
        assert_eq!(
            room.game().last_event.as_deref(),
            Some("The sun rises. Discuss and vote!")
        );

        assert!(room.change_phase(Phase::Voting, &settings(), now).is_ok());
        assert!(room.change_phase(Phase::Night, &settings(), now).is_ok());
        assert_eq!(room.phase(), Phase::Night);
        assert!(
            room.game()
                .last_event
                .as_deref()
                .is_some_and(|e| e.ends_with("Night falls. Special roles act now."))
        );
    }

    #[test]
    fn change_phase_rejects_non_successor() {
        let mut room = started(6);
        let result = room.change_phase(Phase::Voting, &settings(), Instant::now());
        assert!(matches!(
            result,
            Err(CoordinatorError::WrongPhase {
                current: Phase::Night
            })
        ));

        let (mut waiting, _) = room_with(3);
        assert!(waiting.change_phase(Phase::Night, &settings(), Instant::now()).is_err());
    }

    #[test]
    fn votes_only_in_voting_phase() {
        let mut room = started(6);
        let ids: Vec<_> = room.players().map(|p| p.player_id).collect();
        assert!(matches!(
            room.record_vote(ids[0], ids[1]),
            Err(CoordinatorError::WrongPhase { .. })
        ));
    }

    #[test]
    fn voting_round_eliminates_plurality_target() {
        let mut room = started(9);
        let now = Instant::now();
        assert!(room.change_phase(Phase::Day, &settings(), now).is_ok());
        assert!(room.change_phase(Phase::Voting, &settings(), now).is_ok());

        let wolf = first_with_role(&room, Role::Werewolf);
        let villagers = with_role(&room, Role::Villager);
        for voter in villagers.iter().take(3) {
            assert!(room.record_vote(*voter, wolf).is_ok());
        }
        assert_eq!(room.record_vote(wolf, villagers[0]).ok(), Some(4));
        // Re-voting replaces the earlier ballot.
        assert_eq!(room.record_vote(wolf, villagers[1]).ok(), Some(4));

        let change = room.change_phase(Phase::Night, &settings(), now);
        assert!(change.is_ok_and(|c| c.eliminated == Some(wolf)));
        assert_eq!(room.player_by_id(wolf).map(|p| p.status), Some(PlayerStatus::Dead));
        assert!(room.game().votes.is_empty());
    }

    #[test]
    fn voting_out_the_last_werewolf_hands_villagers_the_win() {
        let mut room = started(5);
        let now = Instant::now();
        assert!(room.change_phase(Phase::Day, &settings(), now).is_ok());
        assert!(room.change_phase(Phase::Voting, &settings(), now).is_ok());

        let wolf = first_with_role(&room, Role::Werewolf);
        assert_eq!(with_role(&room, Role::Werewolf).len(), 1);
        let voters: Vec<Uuid> = room
            .players()
            .map(|p| p.player_id)
            .filter(|id| *id != wolf)
            .collect();
        for voter in &voters {
            assert!(room.record_vote(*voter, wolf).is_ok());
        }

        let change = room.change_phase(Phase::Night, &settings(), now);
        assert!(change.is_ok_and(
            |c| c.eliminated == Some(wolf) && c.winner == Some(Winner::Villagers)
        ));
        assert_eq!(room.game().phase, Phase::GameOver);
        assert_eq!(room.game().winner, Some(Winner::Villagers));
        assert!(room.game().phase_deadline.is_none());
    }

    #[test]
    fn dead_players_cannot_vote() {
        let mut room = started(6);
        let now = Instant::now();
        let wolf = first_with_role(&room, Role::Werewolf);
        let villagers = with_role(&room, Role::Villager);
        assert!(room.apply_night_action(wolf, villagers[0], NightAction::Kill).is_ok());
        assert!(room.change_phase(Phase::Day, &settings(), now).is_ok());
        assert!(room.change_phase(Phase::Voting, &settings(), now).is_ok());

        assert!(matches!(
            room.record_vote(villagers[0], wolf),
            Err(CoordinatorError::PlayerNotAlive(_))
        ));
    }

    #[test]
    fn late_joiners_are_not_participants() {
        let mut room = started(6);
        let late = Uuid::new_v4();
        room.add_player("late".into(), late, "Late".to_string(), Instant::now());
        let wolf = first_with_role(&room, Role::Werewolf);

        assert!(matches!(
            room.apply_night_action(wolf, late, NightAction::Kill),
            Err(CoordinatorError::PlayerNotFound(id)) if id == late
        ));
    }

    #[test]
    fn expired_phase_reports_successor() {
        let mut room = started(6);
        let deadline = room.game().phase_deadline;
        assert!(deadline.is_some());
        let deadline = deadline.unwrap_or_else(Instant::now);

        assert_eq!(room.expired_phase(deadline - Duration::from_secs(1)), None);
        assert_eq!(room.expired_phase(deadline), Some(Phase::Day));

        room.game.phase = Phase::GameOver;
        assert_eq!(room.expired_phase(deadline), None);
    }
}
