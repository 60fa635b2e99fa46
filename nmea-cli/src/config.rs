//! Configuration file support for the replay tools

use nmea_io::DEFAULT_PORT;
use nmea_protocol::fault::{FaultConfig, DEFAULT_EVENT_RANGE};
use nmea_protocol::pacing::DEFAULT_INTERVAL;
use nmea_protocol::{ParseTypeError, TypeFilter};
use nmea_replay::EngineOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Replay configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Recorded NMEA0183 log to play back
    pub input: Option<PathBuf>,
    /// Destination UDP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Destination address (limited broadcast by default)
    #[serde(default = "default_destination")]
    pub destination: Ipv4Addr,
    /// Inject corruption and truncation
    #[serde(default)]
    pub corrupt: bool,
    /// Sentence type codes that are never sent
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Restart from the top at end of input
    #[serde(default = "default_loop_playback")]
    pub loop_playback: bool,
    /// Pacing interval before the first timestamp
    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,
    /// One-in-N odds of each rare event
    #[serde(default = "default_event_range")]
    pub event_range: u32,
    /// Seed for reproducible fault injection
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_destination() -> Ipv4Addr {
    Ipv4Addr::BROADCAST
}

fn default_loop_playback() -> bool {
    true
}

fn default_initial_interval_ms() -> u64 {
    DEFAULT_INTERVAL.as_millis() as u64
}

fn default_event_range() -> u32 {
    DEFAULT_EVENT_RANGE
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            input: None,
            port: default_port(),
            destination: default_destination(),
            corrupt: false,
            exclude: Vec::new(),
            loop_playback: default_loop_playback(),
            initial_interval_ms: default_initial_interval_ms(),
            event_range: default_event_range(),
            seed: None,
        }
    }
}

impl ReplayConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: ReplayConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Create example configuration
    pub fn example() -> Self {
        ReplayConfig {
            input: Some(PathBuf::from("nmea_log.txt")),
            exclude: vec!["GSV".to_string(), "GSA".to_string()],
            ..Self::default()
        }
    }

    /// Check the configuration before any playback starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        let input = self.input.as_ref().ok_or(ConfigError::NoInput)?;
        if !input.is_file() {
            return Err(ConfigError::InputMissing(input.clone()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if self.event_range == 0 {
            return Err(ConfigError::Invalid(
                "event_range must be at least 1".to_string(),
            ));
        }
        if self.initial_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "initial_interval_ms must be at least 1".to_string(),
            ));
        }
        self.exclude_filter()?;
        Ok(())
    }

    /// Parse the excluded type codes
    pub fn exclude_filter(&self) -> Result<TypeFilter, ConfigError> {
        Ok(TypeFilter::from_codes(&self.exclude)?)
    }

    pub fn destination_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.destination, self.port)
    }

    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn fault_config(&self) -> FaultConfig {
        FaultConfig {
            corrupt: self.corrupt,
            event_range: self.event_range,
        }
    }

    /// Build the engine settings
    pub fn engine_options(&self) -> Result<EngineOptions, ConfigError> {
        Ok(EngineOptions {
            faults: self.fault_config(),
            exclude: self.exclude_filter()?,
            initial_interval: self.initial_interval(),
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No input file given")]
    NoInput,

    #[error("Input file not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("Invalid exclude list: {0}")]
    Exclude(#[from] ParseTypeError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
