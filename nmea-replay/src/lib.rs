//! NMEA Replay
//!
//! Plays a recorded NMEA0183 log onto the local network as UDP datagrams,
//! pacing sends from the log's own ZDA timestamps and optionally injecting
//! transport faults.

pub mod engine;
pub mod session;
pub mod stats;

pub use nmea_io as io;
pub use nmea_protocol as protocol;

pub use engine::{EngineOptions, LineOutcome, ReplayEngine, ReplayError, ReplayOutcome, ReplayState};
pub use session::{ReplaySession, SessionOutcome};
pub use stats::ReplayStats;
