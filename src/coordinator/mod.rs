//! Operation boundary between the transport and the room sessions.
//!
//! Every inbound event (join, leave, heartbeat, disconnect, game action) and both periodic
//! sweeps go through [`Coordinator`]. Each operation locks one room, mutates it, and
//! pushes the resulting messages through the [`BroadcastGateway`] before releasing the
//! lock, so a room's snapshots reach subscribers in mutation order. A join that moves a
//! connection between rooms holds both locks, taken in room id order.

mod error;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

pub use error::CoordinatorError;

use crate::broadcast::{
    AttributeStore, BroadcastGateway, ConnectionAttributes, RoomSnapshot, ServerMessage,
};
use crate::game::controller::{NightOutcome, PhaseChange};
use crate::game::{GameSettings, NightAction, Phase};
use crate::rooms::RoomDirectory;
use crate::sessions::{ConnectionId, JoinOutcome, RoomSession, SessionRegistry, SharedSession};

/// Longest accepted username, in characters, after trimming.
pub const MAX_USERNAME_CHARS: usize = 32;

#[derive(Debug, Clone, Copy)]
enum RemovalReason {
    Left,
    Disconnected,
    Evicted,
}

impl RemovalReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Disconnected => "disconnected",
            Self::Evicted => "evicted",
        }
    }
}

/// Applies inbound events to live room sessions and publishes the results.
#[derive(Clone)]
pub struct Coordinator {
    registry: SessionRegistry,
    directory: Arc<dyn RoomDirectory>,
    gateway: Arc<dyn BroadcastGateway>,
    attributes: Arc<dyn AttributeStore>,
    settings: GameSettings,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    #[must_use]
    pub fn new(
        directory: Arc<dyn RoomDirectory>,
        gateway: Arc<dyn BroadcastGateway>,
        attributes: Arc<dyn AttributeStore>,
        settings: GameSettings,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(),
            directory,
            gateway,
            attributes,
            settings,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn settings(&self) -> &GameSettings {
        &self.settings
    }

    /// Number of rooms with at least one connected player.
    #[must_use]
    pub fn active_rooms(&self) -> usize {
        self.registry.len()
    }

    /// Room membership stashed for a connection at join time.
    #[must_use]
    pub fn attributes_of(&self, connection_id: &ConnectionId) -> Option<ConnectionAttributes> {
        self.attributes.attributes(connection_id)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Presence
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a connection to a room, creating the room's session on first join.
    ///
    /// On success the connection is subscribed to the room channel, receives `JOINED`,
    /// and the room receives a fresh snapshot. A reconnecting player also gets their
    /// role again if a game is running.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::InvalidUsername`], [`CoordinatorError::RoomNotFound`] when the
    /// directory has no record, [`CoordinatorError::RoomFull`] at capacity, and
    /// [`CoordinatorError::Directory`] if the lookup itself fails.
    pub async fn on_join(
        &self,
        room_id: Uuid,
        connection_id: ConnectionId,
        player_id: Uuid,
        username: &str,
    ) -> Result<JoinOutcome, CoordinatorError> {
        let username = validate_username(username)?;
        let record = self
            .directory
            .find_room(room_id)
            .await
            .map_err(CoordinatorError::Directory)?
            .ok_or(CoordinatorError::RoomNotFound(room_id))?;

        // A connection belongs to one room at a time. The previous room is only left
        // once the new one has admitted the connection.
        let previous_room = self
            .attributes
            .attributes(&connection_id)
            .map(|a| a.room_id)
            .filter(|previous| *previous != room_id);

        loop {
            let shared = self.registry.get_or_create(room_id, &record.name);
            let previous = previous_room
                .and_then(|previous_id| Some((previous_id, self.registry.get(previous_id)?)));

            // Two rooms are always locked in room id order.
            let (mut session, mut previous_session) = match &previous {
                Some((previous_id, other)) if *previous_id < room_id => {
                    let other_guard = other.lock().await;
                    (shared.lock().await, Some(other_guard))
                }
                Some((_, other)) => {
                    let guard = shared.lock().await;
                    (guard, Some(other.lock().await))
                }
                None => (shared.lock().await, None),
            };
            if session.is_closed() {
                // Emptied or closed between lookup and lock; the registry holds a fresh one.
                continue;
            }

            if !session.admits(&connection_id, player_id, record.max_players) {
                if session.is_empty() {
                    session.close();
                    self.registry.discard(room_id, &shared);
                }
                tracing::info!(%room_id, %player_id, max_players = record.max_players, "Join refused, room full");
                return Err(CoordinatorError::RoomFull {
                    room_id,
                    max_players: record.max_players,
                });
            }

            match (&previous, previous_session.as_mut()) {
                (Some((previous_id, other)), Some(previous_session))
                    if !previous_session.is_closed() =>
                {
                    if self.remove_locked(other, previous_session, &connection_id, RemovalReason::Left) {
                        if !previous_session.is_closed() {
                            self.publish(previous_session);
                        }
                    } else {
                        self.forget(*previous_id, &connection_id);
                    }
                }
                _ => {
                    if let Some(previous_id) = previous_room {
                        self.forget(previous_id, &connection_id);
                    }
                }
            }
            drop(previous_session);

            let outcome = session.add_player(
                connection_id.clone(),
                player_id,
                username.clone(),
                Instant::now(),
            );
            // A refresh keeps the identity the connection first joined with.
            let (player_id, username) = session.player(&connection_id).map_or_else(
                || (player_id, username.clone()),
                |p| (p.player_id, p.username.clone()),
            );

            if let JoinOutcome::Reconnected { previous } = &outcome {
                self.gateway.unsubscribe(room_id, previous);
                self.attributes.clear(previous);
            }
            self.attributes.stash(
                &connection_id,
                ConnectionAttributes {
                    room_id,
                    player_id,
                    username: username.clone(),
                },
            );
            self.gateway.subscribe(room_id, &connection_id);

            let is_host = session.is_host(&connection_id);
            self.gateway.unicast(
                &connection_id,
                &ServerMessage::Joined {
                    room_id,
                    player_id,
                    connection_id: connection_id.clone(),
                    is_host,
                },
            );

            match &outcome {
                JoinOutcome::Joined { .. } => {
                    tracing::info!(%room_id, %player_id, %connection_id, %username, is_host, "Player joined");
                }
                JoinOutcome::Refreshed => {
                    tracing::debug!(%room_id, %player_id, %connection_id, "Duplicate join refreshed heartbeat");
                }
                JoinOutcome::Reconnected { previous } => {
                    tracing::info!(%room_id, %player_id, %connection_id, %previous, "Player reconnected");
                    if let Some(role) = session.player(&connection_id).and_then(|p| p.role) {
                        self.gateway
                            .unicast(&connection_id, &ServerMessage::RoleAssigned { room_id, role });
                    }
                }
            }

            self.publish(&mut session);
            return Ok(outcome);
        }
    }

    /// Remove a connection from a room. Idempotent; returns whether a player was removed.
    pub async fn on_leave(&self, room_id: Uuid, connection_id: &ConnectionId) -> bool {
        self.leave(room_id, connection_id, RemovalReason::Left).await
    }

    /// Transport-level disconnect. Resolves the room from the connection's attributes.
    pub async fn on_disconnect(&self, connection_id: &ConnectionId) -> bool {
        let Some(attributes) = self.attributes.attributes(connection_id) else {
            return false;
        };
        self.leave(attributes.room_id, connection_id, RemovalReason::Disconnected)
            .await
    }

    /// Refresh a connection's heartbeat. Nothing is broadcast.
    pub async fn on_heartbeat(&self, room_id: Uuid, connection_id: &ConnectionId) -> bool {
        let Some(shared) = self.registry.get(room_id) else {
            return false;
        };
        let mut session = shared.lock().await;
        !session.is_closed() && session.update_heartbeat(connection_id, Instant::now())
    }

    async fn leave(&self, room_id: Uuid, connection_id: &ConnectionId, reason: RemovalReason) -> bool {
        let Some(shared) = self.registry.get(room_id) else {
            self.forget(room_id, connection_id);
            return false;
        };
        let mut session = shared.lock().await;
        let removed = self.remove_locked(&shared, &mut session, connection_id, reason);
        if removed {
            if !session.is_closed() {
                self.publish(&mut session);
            }
        } else {
            self.forget(room_id, connection_id);
        }
        removed
    }

    /// The one removal path shared by leave, disconnect and eviction.
    ///
    /// Caller holds the room's lock and publishes afterwards if the room survives.
    fn remove_locked(
        &self,
        shared: &SharedSession,
        session: &mut RoomSession,
        connection_id: &ConnectionId,
        reason: RemovalReason,
    ) -> bool {
        let Some(departure) = session.remove_player(connection_id) else {
            return false;
        };
        let room_id = session.room_id();
        self.forget(room_id, connection_id);

        tracing::info!(
            %room_id,
            %connection_id,
            player_id = %departure.player.player_id,
            reason = reason.as_str(),
            remaining = session.player_count(),
            "Player removed"
        );
        if let Some(new_host) = &departure.new_host {
            tracing::info!(%room_id, %new_host, "Host re-elected");
        }

        if departure.emptied {
            self.registry.discard(room_id, shared);
        } else {
            session.settle_winner();
        }
        true
    }

    /// Drop a connection's subscription and its attributes for this room.
    fn forget(&self, room_id: Uuid, connection_id: &ConnectionId) {
        self.gateway.unsubscribe(room_id, connection_id);
        if self
            .attributes
            .attributes(connection_id)
            .is_some_and(|a| a.room_id == room_id)
        {
            self.attributes.clear(connection_id);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Game
    // ─────────────────────────────────────────────────────────────────────────

    /// Start the room's game. Each player is told their role privately.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::RoomNotFound`] without a live session, plus the errors of
    /// [`RoomSession::start_game`].
    pub async fn start_game(&self, room_id: Uuid) -> Result<(), CoordinatorError> {
        self.start(room_id, None).await
    }

    /// Start the room's game on behalf of a connection, which must be the host.
    ///
    /// # Errors
    ///
    /// As [`Self::start_game`], plus [`CoordinatorError::NotHost`].
    pub async fn start_game_by(
        &self,
        room_id: Uuid,
        connection_id: &ConnectionId,
    ) -> Result<(), CoordinatorError> {
        self.start(room_id, Some(connection_id)).await
    }

    async fn start(
        &self,
        room_id: Uuid,
        requested_by: Option<&ConnectionId>,
    ) -> Result<(), CoordinatorError> {
        let shared = self.live_session(room_id)?;
        let mut session = shared.lock().await;
        if session.is_closed() {
            return Err(CoordinatorError::RoomNotFound(room_id));
        }
        if let Some(connection_id) = requested_by
            && !session.is_host(connection_id)
        {
            return Err(CoordinatorError::NotHost);
        }

        session.start_game(&mut rand::thread_rng(), &self.settings, Instant::now())?;

        for player in session.players() {
            if let Some(role) = player.role {
                self.gateway.unicast(
                    &player.connection_id,
                    &ServerMessage::RoleAssigned { room_id, role },
                );
            }
        }
        self.publish(&mut session);
        Ok(())
    }

    /// Record a vote. Returns the number of votes cast this round.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::RoomNotFound`] without a live session, plus the errors of
    /// [`RoomSession::record_vote`].
    pub async fn vote(
        &self,
        room_id: Uuid,
        voter_id: Uuid,
        target_id: Uuid,
    ) -> Result<usize, CoordinatorError> {
        let shared = self.live_session(room_id)?;
        let mut session = shared.lock().await;
        if session.is_closed() {
            return Err(CoordinatorError::RoomNotFound(room_id));
        }

        let votes_cast = session.record_vote(voter_id, target_id)?;
        tracing::debug!(%room_id, %voter_id, %target_id, votes_cast, "Vote recorded");
        self.publish(&mut session);
        Ok(votes_cast)
    }

    /// Apply a night action. A kill is broadcast; an investigation goes to the seer only.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::RoomNotFound`] without a live session, plus the errors of
    /// [`RoomSession::apply_night_action`].
    pub async fn night_action(
        &self,
        room_id: Uuid,
        actor_id: Uuid,
        target_id: Uuid,
        action: NightAction,
    ) -> Result<NightOutcome, CoordinatorError> {
        let shared = self.live_session(room_id)?;
        let mut session = shared.lock().await;
        if session.is_closed() {
            return Err(CoordinatorError::RoomNotFound(room_id));
        }

        let outcome = session.apply_night_action(actor_id, target_id, action)?;
        match &outcome {
            NightOutcome::Killed { .. } => self.publish(&mut session),
            NightOutcome::Revealed {
                seer_connection,
                target_id,
                role,
            } => self.gateway.unicast(
                seer_connection,
                &ServerMessage::SeerResult {
                    target_id: *target_id,
                    role: *role,
                },
            ),
        }
        Ok(outcome)
    }

    /// Move the room's game to `new_phase`.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::RoomNotFound`] without a live session, plus the errors of
    /// [`RoomSession::change_phase`].
    pub async fn change_phase(
        &self,
        room_id: Uuid,
        new_phase: Phase,
    ) -> Result<PhaseChange, CoordinatorError> {
        let shared = self.live_session(room_id)?;
        let mut session = shared.lock().await;
        if session.is_closed() {
            return Err(CoordinatorError::RoomNotFound(room_id));
        }

        let change = session.change_phase(new_phase, &self.settings, Instant::now())?;
        self.publish(&mut session);
        Ok(change)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sweeps & administration
    // ─────────────────────────────────────────────────────────────────────────

    /// Evict every connection whose last heartbeat is older than `now - threshold`.
    ///
    /// Rooms are swept one at a time under their own lock, so a heartbeat or re-join
    /// that lands first is honoured. Returns the number of evictions.
    pub async fn sweep_stale(&self, now: Instant, threshold: Duration) -> usize {
        let Some(cutoff) = now.checked_sub(threshold) else {
            return 0;
        };

        let mut evicted = 0;
        for (room_id, shared) in self.registry.entries() {
            let mut session = shared.lock().await;
            if session.is_closed() {
                continue;
            }
            if session.is_empty() {
                // Created by a join that never took the lock.
                session.close();
                self.registry.discard(room_id, &shared);
                tracing::debug!(%room_id, "Discarded empty session");
                continue;
            }
            let stale = session.stale_connections(cutoff);
            if stale.is_empty() {
                continue;
            }

            let mut removed = 0;
            for connection_id in &stale {
                if self.remove_locked(&shared, &mut session, connection_id, RemovalReason::Evicted) {
                    removed += 1;
                }
            }
            if !session.is_closed() {
                self.publish(&mut session);
            }
            tracing::info!(%room_id, evicted = removed, "Evicted stale connections");
            evicted += removed;
        }

        if evicted > 0 {
            tracing::info!(evicted, rooms = self.registry.len(), "Heartbeat sweep finished");
        } else {
            tracing::debug!(rooms = self.registry.len(), "Heartbeat sweep found nothing stale");
        }
        evicted
    }

    /// Advance every running game whose phase timer has expired. Returns how many moved.
    pub async fn advance_expired_phases(&self, now: Instant) -> usize {
        let mut advanced = 0;
        for (room_id, shared) in self.registry.entries() {
            let mut session = shared.lock().await;
            if session.is_closed() {
                continue;
            }
            let Some(next) = session.expired_phase(now) else {
                continue;
            };
            match session.change_phase(next, &self.settings, now) {
                Ok(_) => {
                    advanced += 1;
                    self.publish(&mut session);
                }
                Err(e) => tracing::warn!(%room_id, error = %e, "Phase clock could not advance room"),
            }
        }
        advanced
    }

    /// Tear down a room's live session and tell its subscribers. Returns `false` if
    /// nobody was online.
    pub async fn close_room(&self, room_id: Uuid) -> bool {
        let Some(shared) = self.registry.remove(room_id) else {
            return false;
        };
        let mut session = shared.lock().await;
        session.close();

        self.gateway
            .broadcast(room_id, &ServerMessage::RoomClosed { room_id });
        let connections: Vec<_> = session.players().map(|p| p.connection_id.clone()).collect();
        for connection_id in &connections {
            self.forget(room_id, connection_id);
        }

        tracing::info!(%room_id, disconnected = connections.len(), "Room session closed");
        true
    }

    /// Current snapshot of a live room.
    pub async fn snapshot(&self, room_id: Uuid) -> Option<RoomSnapshot> {
        let shared = self.registry.get(room_id)?;
        let session = shared.lock().await;
        if session.is_closed() {
            return None;
        }
        Some(RoomSnapshot::capture(&session, Instant::now()))
    }

    fn live_session(&self, room_id: Uuid) -> Result<SharedSession, CoordinatorError> {
        self.registry
            .get(room_id)
            .ok_or(CoordinatorError::RoomNotFound(room_id))
    }

    /// Broadcast the room's snapshot. Caller holds the room's lock.
    fn publish(&self, session: &mut RoomSession) {
        session.ensure_host();
        let snapshot = RoomSnapshot::capture(session, Instant::now());
        self.gateway
            .broadcast(session.room_id(), &ServerMessage::RoomStateUpdate(snapshot));
    }
}

/// Trimmed username, 1 to [`MAX_USERNAME_CHARS`] characters.
///
/// # Errors
///
/// [`CoordinatorError::InvalidUsername`] when empty or too long after trimming.
pub fn validate_username(username: &str) -> Result<String, CoordinatorError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return Err(CoordinatorError::InvalidUsername(
            "must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_USERNAME_CHARS {
        return Err(CoordinatorError::InvalidUsername(format!(
            "must be at most {MAX_USERNAME_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}
