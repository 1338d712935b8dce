//! Runtime configuration for the game server

use shared::{FPS, PORT};
use std::time::Duration;

/// Wins a player needs before the match ends.
pub const DEFAULT_WINS_TO_WIN: u32 = 3;
/// First value shown by the pre-round countdown; it counts down to 0.
pub const DEFAULT_COUNTDOWN_FROM: u8 = 3;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tick_rate: u32,
    pub wins_to_win: u32,
    pub countdown_from: u8,
    pub countdown_interval: Duration,
    /// How long a parked `accept` waits before re-checking the running flag
    pub accept_poll: Duration,
    /// How long a connection read waits before re-checking the running flag
    pub read_poll: Duration,
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: PORT,
            tick_rate: FPS,
            wins_to_win: DEFAULT_WINS_TO_WIN,
            countdown_from: DEFAULT_COUNTDOWN_FROM,
            countdown_interval: Duration::from_secs(1),
            accept_poll: Duration::from_secs(1),
            read_poll: Duration::from_secs(1),
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}
