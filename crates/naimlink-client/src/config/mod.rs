//! Client config loader (strict parsing).

pub mod schema;

use std::fs;

use naimlink_core::error::{NaimError, Result};

pub use schema::{ClientConfig, DeviceSection, Power, SessionSection, StartupActions};

pub fn load_from_file(path: &str) -> Result<ClientConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| NaimError::Config(format!("read config `{path}` failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ClientConfig> {
    let cfg: ClientConfig = serde_yaml::from_str(s)
        .map_err(|e| NaimError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
