//! NMEA Replay CLI Library
//!
//! Shared functionality for the replay command-line tools.

pub mod config;
pub mod signal;
pub mod stats;

pub use config::{ConfigError, ReplayConfig};
pub use stats::{display_pass_stats, fault_summary, format_bytes, format_duration, format_interval};
