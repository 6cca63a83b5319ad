use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;
use naimlink_core::error::{NaimError, Result};

/// Port the device's control API listens on.
pub const DEFAULT_PORT: u16 = 15555;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    pub device: DeviceSection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub startup: Option<StartupActions>,
}

impl ClientConfig {
    /// Minimal config for a device address with every other setting defaulted.
    pub fn for_address(address: impl Into<String>) -> Self {
        Self {
            version: 1,
            device: DeviceSection {
                address: address.into(),
                port: DEFAULT_PORT,
            },
            session: SessionSection::default(),
            startup: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(NaimError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.device.validate()?;
        self.session.validate()?;
        if let Some(startup) = &self.startup {
            startup.validate()?;
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.device.socket_addr()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSection {
    /// IPv4/IPv6 literal; host names are not resolved.
    pub address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl DeviceSection {
    pub fn validate(&self) -> Result<()> {
        self.socket_addr().map(|_| ())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.address.trim().parse().map_err(|_| {
            NaimError::Config(format!(
                "device.address `{}` is not a valid IP address",
                self.address
            ))
        })?;
        if self.port == 0 {
            return Err(NaimError::Config("device.port must not be 0".into()));
        }
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    /// Device-side idle timeout; absent disables the heartbeat.
    #[serde(default)]
    pub heartbeat_timeout_secs: Option<u64>,

    #[serde(default)]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_read_chunk_bytes")]
    pub read_chunk_bytes: usize,

    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: None,
            reconnect_delay_ms: 0,
            read_chunk_bytes: default_read_chunk_bytes(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

impl SessionSection {
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.heartbeat_timeout_secs {
            if !(2..=3600).contains(&t) {
                return Err(NaimError::Config(
                    "session.heartbeat_timeout_secs must be between 2 and 3600".into(),
                ));
            }
        }
        if self.reconnect_delay_ms > 60_000 {
            return Err(NaimError::Config(
                "session.reconnect_delay_ms must be at most 60000".into(),
            ));
        }
        if !(64..=65_536).contains(&self.read_chunk_bytes) {
            return Err(NaimError::Config(
                "session.read_chunk_bytes must be between 64 and 65536".into(),
            ));
        }
        if !(1024..=16 * 1024 * 1024).contains(&self.max_message_bytes) {
            return Err(NaimError::Config(
                "session.max_message_bytes must be between 1024 and 16777216".into(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_timeout(&self) -> Option<Duration> {
        self.heartbeat_timeout_secs.map(Duration::from_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

fn default_read_chunk_bytes() -> usize {
    2000
}
fn default_max_message_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Power {
    On,
    Off,
}

/// One-shot actions the binary performs after the first connect.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartupActions {
    #[serde(default)]
    pub power: Option<Power>,
    #[serde(default)]
    pub preset: Option<u32>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub volume: Option<u32>,
}

impl StartupActions {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.volume, Some(v) if v > 100) {
            return Err(NaimError::Config("startup.volume must be between 0 and 100".into()));
        }
        if matches!(self.preset, Some(0)) {
            return Err(NaimError::Config("startup.preset starts at 1".into()));
        }
        if self.preset.is_some() && self.input.is_some() {
            return Err(NaimError::Config(
                "startup.preset and startup.input are mutually exclusive".into(),
            ));
        }
        Ok(())
    }
}
