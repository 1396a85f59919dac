use std::time::Duration;

use serde::Deserialize;
use undercover_core::error::{Result, UndercoverError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub rooms: RoomsSection,

    #[serde(default)]
    pub game: GameRules,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(UndercoverError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.rooms.validate()?;
        self.game.validate()?;

        Ok(())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            gateway: GatewaySection::default(),
            rooms: RoomsSection::default(),
            game: GameRules::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Per-connection outbound queue (the player's sink).
    #[serde(default = "default_queue")]
    pub outbound_queue: usize,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            outbound_queue: default_queue(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        if !(5000..=120000).contains(&self.ping_interval_ms) {
            return Err(UndercoverError::BadRequest(
                "gateway.ping_interval_ms must be between 5000 and 120000".into(),
            ));
        }
        if !(10000..=600000).contains(&self.idle_timeout_ms) {
            return Err(UndercoverError::BadRequest(
                "gateway.idle_timeout_ms must be between 10000 and 600000".into(),
            ));
        }
        if self.idle_timeout_ms <= self.ping_interval_ms {
            return Err(UndercoverError::BadRequest(
                "gateway.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if self.outbound_queue == 0 {
            return Err(UndercoverError::BadRequest(
                "gateway.outbound_queue must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoomsSection {
    /// Bounded mailbox feeding each room's event loop.
    #[serde(default = "default_queue")]
    pub mailbox_capacity: usize,

    /// How long a handshake waits for the room to acknowledge a join.
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

impl Default for RoomsSection {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_queue(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

impl RoomsSection {
    pub fn validate(&self) -> Result<()> {
        if self.mailbox_capacity == 0 {
            return Err(UndercoverError::BadRequest(
                "rooms.mailbox_capacity must be at least 1".into(),
            ));
        }
        if !(100..=60000).contains(&self.join_timeout_ms) {
            return Err(UndercoverError::BadRequest(
                "rooms.join_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Seat limits, round cap and stage deadlines for every room.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GameRules {
    /// Alive (non-admin, non-observer) seats; later joiners watch.
    #[serde(default = "default_players")]
    pub max_players: usize,
    /// Alive players required before the admin may start.
    #[serde(default = "default_players")]
    pub min_players: usize,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    #[serde(default = "default_preparing_ms")]
    pub preparing_ms: u64,
    #[serde(default = "default_first_speaker_ms")]
    pub first_speaker_ms: u64,
    #[serde(default = "default_speaker_ms")]
    pub speaker_ms: u64,
    #[serde(default = "default_voting_ms")]
    pub voting_ms: u64,
    #[serde(default = "default_judging_ms")]
    pub judging_ms: u64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_players: default_players(),
            min_players: default_players(),
            max_rounds: default_max_rounds(),
            preparing_ms: default_preparing_ms(),
            first_speaker_ms: default_first_speaker_ms(),
            speaker_ms: default_speaker_ms(),
            voting_ms: default_voting_ms(),
            judging_ms: default_judging_ms(),
        }
    }
}

impl GameRules {
    pub fn validate(&self) -> Result<()> {
        // one blank, one spy, at least one normal player
        if self.min_players < 3 {
            return Err(UndercoverError::BadRequest(
                "game.min_players must be at least 3".into(),
            ));
        }
        if self.min_players > self.max_players {
            return Err(UndercoverError::BadRequest(
                "game.min_players must not exceed game.max_players".into(),
            ));
        }
        if self.max_rounds == 0 {
            return Err(UndercoverError::BadRequest(
                "game.max_rounds must be at least 1".into(),
            ));
        }
        let timings = [
            self.preparing_ms,
            self.first_speaker_ms,
            self.speaker_ms,
            self.voting_ms,
            self.judging_ms,
        ];
        if timings.contains(&0) {
            return Err(UndercoverError::BadRequest(
                "game stage timings must be at least 1ms".into(),
            ));
        }
        Ok(())
    }

    pub fn preparing(&self) -> Duration {
        Duration::from_millis(self.preparing_ms)
    }
    pub fn first_speaker(&self) -> Duration {
        Duration::from_millis(self.first_speaker_ms)
    }
    pub fn speaker(&self) -> Duration {
        Duration::from_millis(self.speaker_ms)
    }
    pub fn voting(&self) -> Duration {
        Duration::from_millis(self.voting_ms)
    }
    pub fn judging(&self) -> Duration {
        Duration::from_millis(self.judging_ms)
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}
fn default_ping_interval_ms() -> u64 {
    30000
}
fn default_idle_timeout_ms() -> u64 {
    45000
}
fn default_queue() -> usize {
    64
}
fn default_join_timeout_ms() -> u64 {
    3000
}
fn default_players() -> usize {
    8
}
fn default_max_rounds() -> u32 {
    4
}
fn default_preparing_ms() -> u64 {
    30000
}
fn default_first_speaker_ms() -> u64 {
    40000
}
fn default_speaker_ms() -> u64 {
    20000
}
fn default_voting_ms() -> u64 {
    30000
}
fn default_judging_ms() -> u64 {
    10000
}
