//! NMEA Replay I/O and Platform Abstraction
//!
//! This crate provides the side-effecting half of playback: the UDP
//! broadcast transmitter, an in-memory recording sink, and the wall clock
//! with its shutdown-aware pacing sleep.

pub mod socket;
pub mod time;

pub use socket::{BroadcastSocket, DatagramSink, RecordingSink, SocketError, DEFAULT_PORT};
pub use time::{
    shutdown_channel, Clock, ManualClock, ShutdownListener, ShutdownTrigger, SleepOutcome,
    SystemClock,
};
