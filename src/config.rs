use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::game::{DEFAULT_MIN_PLAYERS, DEFAULT_PHASE_DURATION, GameSettings};
use crate::monitor::{DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_HEARTBEAT_TIMEOUT, HeartbeatSettings};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: IpAddr,
    pub server_port: u16,
    pub environment: Environment,
    pub log_level: String,
    pub frontend_url: String,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub phase_duration: Duration,
    pub min_players: usize,
    pub auto_advance_phases: bool,
}

/// Deployment environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required: `DATABASE_URL`
    /// Optional with defaults: `SERVER_HOST`, `SERVER_PORT`, `ENVIRONMENT`, `LOG_LEVEL`,
    /// `FRONTEND_URL`, `HEARTBEAT_INTERVAL_SECS`, `HEARTBEAT_TIMEOUT_SECS`,
    /// `PHASE_DURATION_SECS`, `MIN_PLAYERS`, `AUTO_ADVANCE_PHASES`
    ///
    /// `PORT` overrides `SERVER_PORT`, and in production the host defaults to `0.0.0.0`.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is not set, or if any optional variable holds
    /// a value that does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let environment = match std::env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .as_str()
        {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        };

        let server_port = std::env::var("PORT")
            .or_else(|_| std::env::var("SERVER_PORT"))
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| anyhow::anyhow!("SERVER_PORT / PORT must be a valid u16"))?;

        let default_host = if environment == Environment::Production {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };

        let server_host = std::env::var("SERVER_HOST")
            .unwrap_or_else(|_| default_host.to_string())
            .parse::<IpAddr>()
            .map_err(|_| anyhow::anyhow!("SERVER_HOST must be a valid IP address"))?;

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3001".to_string());

        let heartbeat_interval =
            secs_from_env("HEARTBEAT_INTERVAL_SECS", DEFAULT_HEARTBEAT_INTERVAL)?;
        let heartbeat_timeout = secs_from_env("HEARTBEAT_TIMEOUT_SECS", DEFAULT_HEARTBEAT_TIMEOUT)?;
        let phase_duration = secs_from_env("PHASE_DURATION_SECS", DEFAULT_PHASE_DURATION)?;

        let min_players = match std::env::var("MIN_PLAYERS") {
            Ok(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| anyhow::anyhow!("MIN_PLAYERS must be a positive integer"))?,
            Err(_) => DEFAULT_MIN_PLAYERS,
        };

        let auto_advance_phases = match std::env::var("AUTO_ADVANCE_PHASES") {
            Ok(raw) => parse_flag(&raw)
                .ok_or_else(|| anyhow::anyhow!("AUTO_ADVANCE_PHASES must be true or false"))?,
            Err(_) => true,
        };

        Ok(Self {
            database_url,
            server_host,
            server_port,
            environment,
            log_level,
            frontend_url,
            heartbeat_interval,
            heartbeat_timeout,
            phase_duration,
            min_players,
            auto_advance_phases,
        })
    }

    /// Build the socket address for the server to bind to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server_host, self.server_port)
    }

    #[must_use]
    pub const fn game_settings(&self) -> GameSettings {
        GameSettings {
            min_players: self.min_players,
            phase_duration: self.phase_duration,
        }
    }

    #[must_use]
    pub const fn heartbeat_settings(&self) -> HeartbeatSettings {
        HeartbeatSettings {
            interval: self.heartbeat_interval,
            timeout: self.heartbeat_timeout,
        }
    }
}

/// Read a whole number of seconds from `key`, falling back to `default` when unset.
fn secs_from_env(key: &str, default: Duration) -> anyhow::Result<Duration> {
    std::env::var(key).map_or(Ok(default), |raw| {
        raw.parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| anyhow::anyhow!("{key} must be a positive number of seconds"))
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
