//! Background tasks that drive the coordinator on a timer.
//!
//! - Heartbeat monitor: evicts connections that stopped sending heartbeats.
//! - Phase clock: advances games whose phase timer ran out.

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::coordinator::Coordinator;

/// How often the heartbeat monitor sweeps.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(45);

/// Silence after which a connection counts as gone.
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the phase clock checks for expired phases.
pub const PHASE_CLOCK_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            timeout: DEFAULT_HEARTBEAT_TIMEOUT,
        }
    }
}

/// Spawn the periodic stale-connection sweep.
pub fn spawn_heartbeat_monitor(coordinator: Coordinator, settings: HeartbeatSettings) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; nothing can be stale yet.
        ticker.tick().await;

        tracing::info!(
            interval_secs = settings.interval.as_secs(),
            timeout_secs = settings.timeout.as_secs(),
            "Heartbeat monitor started"
        );
        loop {
            ticker.tick().await;
            coordinator.sweep_stale(Instant::now(), settings.timeout).await;
        }
    })
}

/// Spawn the clock that advances expired game phases.
pub fn spawn_phase_clock(coordinator: Coordinator, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(tick_ms = tick.as_millis(), "Phase clock started");
        loop {
            ticker.tick().await;
            let advanced = coordinator.advance_expired_phases(Instant::now()).await;
            if advanced > 0 {
                tracing::debug!(advanced, "Phase clock advanced rooms");
            }
        }
    })
}
