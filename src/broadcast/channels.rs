//! `WebSocket` delivery for the broadcast gateway.
//!
//! Every socket registers an outbound channel under its connection id. Room channels
//! are sets of subscribed connection ids; a broadcast serializes once and pushes the
//! text into each subscriber's channel. The writer task owned by the socket drains it.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{AttributeStore, BroadcastGateway, ConnectionAttributes, ServerMessage};
use crate::sessions::ConnectionId;

/// Outbound text channel of one `WebSocket` client.
pub type WsTx = mpsc::UnboundedSender<String>;

/// Tracks live sockets, room subscriptions and per-connection attributes.
#[derive(Debug, Clone, Default)]
pub struct WsChannels {
    /// `connection_id` → sender channel
    connections: Arc<DashMap<ConnectionId, WsTx>>,
    /// `room_id` → subscribed connections
    rooms: Arc<DashMap<Uuid, DashSet<ConnectionId>>>,
    /// `connection_id` → room membership stashed at join
    attributes: Arc<DashMap<ConnectionId, ConnectionAttributes>>,
}

impl WsChannels {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket's outbound channel.
    pub fn register(&self, connection_id: ConnectionId, tx: WsTx) {
        self.connections.insert(connection_id, tx);
    }

    /// Forget a socket. Subscriptions are dropped by the coordinator's disconnect path.
    pub fn unregister(&self, connection_id: &ConnectionId) {
        self.connections.remove(connection_id);
    }

    /// Number of registered sockets.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connections subscribed to a room's channel.
    #[must_use]
    pub fn subscribers(&self, room_id: Uuid) -> usize {
        self.rooms.get(&room_id).map_or(0, |members| members.len())
    }

    fn send_text(&self, connection_id: &ConnectionId, text: &str) {
        if let Some(tx) = self.connections.get(connection_id) {
            // A closed receiver means the socket is going away; its reader cleans up.
            let _ = tx.send(text.to_string());
        }
    }

    fn encode(message: &ServerMessage) -> Option<String> {
        match serde_json::to_string(message) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize outbound message");
                None
            }
        }
    }
}

impl BroadcastGateway for WsChannels {
    fn subscribe(&self, room_id: Uuid, connection_id: &ConnectionId) {
        self.rooms
            .entry(room_id)
            .or_default()
            .insert(connection_id.clone());
    }

    fn unsubscribe(&self, room_id: Uuid, connection_id: &ConnectionId) {
        if let Some(members) = self.rooms.get(&room_id) {
            members.remove(connection_id);
            if members.is_empty() {
                drop(members);
                self.rooms.remove_if(&room_id, |_, members| members.is_empty());
            }
        }
    }

    fn broadcast(&self, room_id: Uuid, message: &ServerMessage) {
        let Some(text) = Self::encode(message) else {
            return;
        };
        if let Some(members) = self.rooms.get(&room_id) {
            for member in members.iter() {
                self.send_text(&member, &text);
            }
        }
    }

    fn unicast(&self, connection_id: &ConnectionId, message: &ServerMessage) {
        if let Some(text) = Self::encode(message) {
            self.send_text(connection_id, &text);
        }
    }
}

impl AttributeStore for WsChannels {
    fn stash(&self, connection_id: &ConnectionId, attributes: ConnectionAttributes) {
        self.attributes.insert(connection_id.clone(), attributes);
    }

    fn attributes(&self, connection_id: &ConnectionId) -> Option<ConnectionAttributes> {
        self.attributes
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    fn clear(&self, connection_id: &ConnectionId) -> Option<ConnectionAttributes> {
        self.attributes
            .remove(connection_id)
            .map(|(_, attributes)| attributes)
    }
}
