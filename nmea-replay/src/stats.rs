//! Playback statistics

use nmea_protocol::fault::{FaultAction, FaultDecision};

/// Counters for one pass over the input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Lines read from the input
    pub lines_read: u64,
    /// Lines skipped because their type is excluded
    pub lines_excluded: u64,
    /// ZDA sentences fed to the rate estimator
    pub timestamps: u64,
    /// Timestamps that did not advance and were skipped
    pub pacing_anomalies: u64,
    /// Datagrams handed to the sink
    pub datagrams_sent: u64,
    /// Payload bytes handed to the sink
    pub bytes_sent: u64,
    /// Lines sent as two datagrams
    pub splits: u64,
    /// Lines deferred onto the next line
    pub deferrals: u64,
    /// Lines with one corrupted byte
    pub corruptions: u64,
    /// Lines cut short
    pub truncations: u64,
    /// Bytes left in the carry buffer at end of input
    pub dropped_carry_bytes: u64,
}

impl ReplayStats {
    /// Account for the fault decision made for one line
    pub fn record_decision(&mut self, decision: &FaultDecision) {
        if decision.corruption.is_some() {
            self.corruptions += 1;
        }
        if decision.truncation.is_some() {
            self.truncations += 1;
        }
        match decision.action {
            FaultAction::Whole(_) => {}
            FaultAction::Split { .. } => self.splits += 1,
            FaultAction::Defer { .. } => self.deferrals += 1,
        }
    }

    /// Account for one datagram sent
    pub fn record_datagram(&mut self, len: usize) {
        self.datagrams_sent += 1;
        self.bytes_sent += len as u64;
    }

    /// Total injected faults of any kind
    pub fn faults(&self) -> u64 {
        self.splits + self.deferrals + self.corruptions + self.truncations
    }
}
