//! Werewolf API - room session coordinator for a multiplayer werewolf party game
//!
//! This crate tracks who is present in each game room and drives the game itself:
//! - Presence: join, leave, heartbeat eviction and host election
//! - Game: role assignment, night actions, voting and win detection
//! - Delivery: room snapshots and private messages over `WebSocket`
//! - REST: room records and game control

pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod entities;
pub mod error;
pub mod game;
pub mod monitor;
pub mod rooms;
pub mod routes;
pub mod sessions;
pub mod state;
