//! NMEA0183 Replay Core
//!
//! This crate implements the pure logic behind log playback: sentence
//! classification, ZDA timestamp decoding, adaptive pacing, fault
//! injection and fragmentation, and offline sentence coverage analysis.
//! It performs no I/O.

pub mod coverage;
pub mod fault;
pub mod pacing;
pub mod sentence;
pub mod timestamp;

pub use coverage::{CoverageAnalyzer, CoverageReport, CoverageWindow, SentenceCoverage};
pub use fault::{
    CarryBuffer, Corruption, DecisionSource, FaultAction, FaultConfig, FaultDecision,
    FaultInjector, RandomDecisions, ScriptedDecisions,
};
pub use pacing::{Observation, PacingAnomaly, PacingState, RateEstimator};
pub use sentence::{sentence_type, ParseTypeError, Sentence, SentenceType, TypeFilter};
pub use timestamp::{decode_datetime, DecodeError, ZdaTimestamp};
