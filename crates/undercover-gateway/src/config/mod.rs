//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;

use undercover_core::error::{Result, UndercoverError};

pub use schema::{GameRules, GatewayConfig, GatewaySection, RoomsSection};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "UNDERCOVER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "undercover.yaml";

pub fn load_from_file(path: &str) -> Result<GatewayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| UndercoverError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<GatewayConfig> {
    let cfg: GatewayConfig = serde_yaml::from_str(s)
        .map_err(|e| UndercoverError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Path from `UNDERCOVER_CONFIG`, falling back to `undercover.yaml`.
pub fn config_path() -> String {
    std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned())
}
