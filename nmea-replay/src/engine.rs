//! Replay Engine
//!
//! Drives one pass over a recorded log. Each line is classified, fed to the
//! rate estimator when it is a ZDA sentence, passed through the fault
//! injector together with any carried-over bytes, and the resulting chunks
//! are sent with a pacing sleep after each one.
//!
//! The engine owns all cross-line state (estimator, carry buffer, counters),
//! so independent sessions never share anything.

use crate::stats::ReplayStats;
use chrono::NaiveDateTime;
use nmea_io::socket::{DatagramSink, SocketError};
use nmea_io::time::{Clock, SleepOutcome};
use nmea_protocol::fault::{
    CarryBuffer, DecisionSource, FaultAction, FaultConfig, FaultDecision, FaultInjector,
};
use nmea_protocol::pacing::{Observation, RateEstimator, DEFAULT_INTERVAL};
use nmea_protocol::sentence::{sentence_type, SentenceType, TypeFilter};
use nmea_protocol::timestamp::{decode_datetime, DecodeError};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Playback errors; all of them end the session
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read input: {0}")]
    Read(#[from] io::Error),

    #[error("malformed timestamp on line {line}: {source}")]
    Decode {
        line: u64,
        #[source]
        source: DecodeError,
    },

    #[error("transmission failed: {0}")]
    Send(#[from] SocketError),
}

/// Engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    /// No timestamp seen yet; pacing uses the initial interval
    AwaitingFirstTimestamp,
    /// Pacing follows the recorded timestamps
    Steady,
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Fault injection settings
    pub faults: FaultConfig,
    /// Sentence types never sent
    pub exclude: TypeFilter,
    /// Interval before the first timestamp and after a reset
    pub initial_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            faults: FaultConfig::default(),
            exclude: TypeFilter::new(),
            initial_interval: DEFAULT_INTERVAL,
        }
    }
}

/// What happened to one input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Type is excluded; nothing sent
    Excluded,
    /// Sent as this many datagrams
    Transmitted { datagrams: usize },
    /// Held in the carry buffer
    Deferred,
    /// Shutdown requested during a pacing sleep
    Interrupted,
}

/// How a pass over the input ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// All lines were processed
    EndOfInput(ReplayStats),
    /// Shutdown was requested
    Interrupted(ReplayStats),
}

impl ReplayOutcome {
    pub fn stats(&self) -> &ReplayStats {
        match self {
            ReplayOutcome::EndOfInput(stats) | ReplayOutcome::Interrupted(stats) => stats,
        }
    }
}

/// Single-session playback engine
pub struct ReplayEngine<S, D, C> {
    sink: S,
    injector: FaultInjector<D>,
    estimator: RateEstimator,
    carry: CarryBuffer,
    clock: C,
    exclude: TypeFilter,
    state: ReplayState,
    first_timestamp: Option<NaiveDateTime>,
    stats: ReplayStats,
    line_number: u64,
}

impl<S, D, C> ReplayEngine<S, D, C>
where
    S: DatagramSink,
    D: DecisionSource,
    C: Clock,
{
    /// Create a new engine
    pub fn new(sink: S, decisions: D, clock: C, options: EngineOptions) -> Self {
        ReplayEngine {
            sink,
            injector: FaultInjector::new(options.faults, decisions),
            estimator: RateEstimator::new(options.initial_interval),
            carry: CarryBuffer::new(),
            clock,
            exclude: options.exclude,
            state: ReplayState::AwaitingFirstTimestamp,
            first_timestamp: None,
            stats: ReplayStats::default(),
            line_number: 0,
        }
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    /// Current pacing interval
    pub fn interval(&self) -> Duration {
        self.estimator.interval()
    }

    pub fn estimator(&self) -> &RateEstimator {
        &self.estimator
    }

    /// Bytes waiting to be prefixed onto the next line
    pub fn carry(&self) -> &CarryBuffer {
        &self.carry
    }

    /// Counters for the current pass
    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.first_timestamp
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Return to the initial state for a fresh pass
    ///
    /// The estimator goes back to its initial interval, pending carry is
    /// dropped, and counters restart. The decision source keeps its state.
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.carry.clear();
        self.state = ReplayState::AwaitingFirstTimestamp;
        self.first_timestamp = None;
        self.stats = ReplayStats::default();
        self.line_number = 0;
    }

    /// Play every line of `reader`
    ///
    /// Bytes still in the carry buffer at end of input are not sent.
    pub fn replay<R: BufRead>(&mut self, mut reader: R) -> Result<ReplayOutcome, ReplayError> {
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if self.process_line(&line)? == LineOutcome::Interrupted {
                info!("Shutdown requested after line {}", self.line_number);
                return Ok(ReplayOutcome::Interrupted(self.stats));
            }
        }

        if !self.carry.is_empty() {
            warn!(
                "End of input with {} deferred bytes pending; they are not sent",
                self.carry.len()
            );
        }
        self.stats.dropped_carry_bytes = self.carry.len() as u64;
        info!(
            "End of input: {} lines, {} datagrams",
            self.stats.lines_read, self.stats.datagrams_sent
        );
        Ok(ReplayOutcome::EndOfInput(self.stats))
    }

    /// Process one raw line, terminator included
    pub fn process_line(&mut self, line: &[u8]) -> Result<LineOutcome, ReplayError> {
        self.line_number += 1;
        self.stats.lines_read += 1;

        if self.exclude.excludes_line(line) {
            debug!("not sending {}", String::from_utf8_lossy(line).trim_end());
            self.stats.lines_excluded += 1;
            return Ok(LineOutcome::Excluded);
        }

        if sentence_type(line) == Some(SentenceType::ZDA) {
            self.observe_timestamp(line)?;
        }

        let decision = self.injector.apply(&mut self.carry, line);
        log_decision(&decision);
        self.stats.record_decision(&decision);

        if decision.is_deferred() {
            return Ok(LineOutcome::Deferred);
        }
        self.transmit(&decision)
    }

    fn observe_timestamp(&mut self, line: &[u8]) -> Result<(), ReplayError> {
        let timestamp = decode_datetime(line).map_err(|source| ReplayError::Decode {
            line: self.line_number,
            source,
        })?;
        self.stats.timestamps += 1;

        if self.state == ReplayState::AwaitingFirstTimestamp {
            info!(
                "Found first timestamp {}",
                timestamp.format("%Y-%m-%d %H:%M:%S")
            );
            self.first_timestamp = Some(timestamp);
            self.state = ReplayState::Steady;
        }

        match self.estimator.observe(self.clock.now(), timestamp) {
            Observation::First => {}
            Observation::Updated {
                ratio,
                interval,
                sent,
                ..
            } => {
                debug!(
                    "Pacing ratio {:.3} over {} sends, interval now {:?}",
                    ratio, sent, interval
                );
            }
            Observation::Anomaly(anomaly) => {
                warn!("Pacing anomaly on line {}: {}", self.line_number, anomaly);
                self.stats.pacing_anomalies += 1;
            }
        }
        Ok(())
    }

    fn transmit(&mut self, decision: &FaultDecision) -> Result<LineOutcome, ReplayError> {
        let chunks = decision.chunks();
        for chunk in &chunks {
            // An empty chunk (split at index 0) is not a datagram, but the
            // pacing sleep still applies.
            if !chunk.is_empty() {
                self.sink.send_datagram(chunk)?;
                self.stats.record_datagram(chunk.len());
                self.estimator.on_sent();
            }
            if self.clock.sleep(self.estimator.interval()) == SleepOutcome::Interrupted {
                return Ok(LineOutcome::Interrupted);
            }
        }
        Ok(LineOutcome::Transmitted {
            datagrams: chunks.iter().filter(|chunk| !chunk.is_empty()).count(),
        })
    }
}

fn log_decision(decision: &FaultDecision) {
    if let Some(corruption) = decision.corruption {
        debug!(
            "replacing {:?} with {:?} at {}",
            corruption.original as char, corruption.replacement as char, corruption.index
        );
    }
    if let Some(len) = decision.truncation {
        debug!("truncating to length {}", len);
    }
    match decision.action {
        FaultAction::Whole(_) => {}
        FaultAction::Split { index, .. } => debug!("splitting at index {}", index),
        FaultAction::Defer { len } => debug!("deferring {} bytes to the next send", len),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nmea_io::socket::RecordingSink;
    use nmea_io::time::ManualClock;
    use nmea_protocol::fault::ScriptedDecisions;

    type TestEngine = ReplayEngine<RecordingSink, ScriptedDecisions, ManualClock>;

    fn engine(decisions: ScriptedDecisions, options: EngineOptions) -> TestEngine {
        ReplayEngine::new(RecordingSink::new(), decisions, ManualClock::new(), options)
    }

    #[test]
    fn test_engine_creation() {
        let engine = engine(ScriptedDecisions::new(), EngineOptions::default());

        assert_eq!(engine.state(), ReplayState::AwaitingFirstTimestamp);
        assert_eq!(engine.interval(), DEFAULT_INTERVAL);
        assert!(engine.carry().is_empty());
        assert_eq!(engine.stats(), &ReplayStats::default());
    }

    #[test]
    fn test_plain_line_sent_and_paced() {
        let mut engine = engine(ScriptedDecisions::new(), EngineOptions::default());

        let outcome = engine.process_line(b"$GPRMC,1,2*00\r\n").unwrap();
        assert_eq!(outcome, LineOutcome::Transmitted { datagrams: 1 });
        assert_eq!(engine.sink().concatenated(), b"$GPRMC,1,2*00\r\n");
        assert_eq!(engine.clock().sleeps(), vec![DEFAULT_INTERVAL]);
        assert_eq!(engine.stats().datagrams_sent, 1);
        assert_eq!(engine.stats().bytes_sent, 15);
    }

    #[test]
    fn test_first_timestamp_transitions_state() {
        let mut engine = engine(ScriptedDecisions::new(), EngineOptions::default());

        engine.process_line(b"$GPRMC,1,2*00\r\n").unwrap();
        assert_eq!(engine.state(), ReplayState::AwaitingFirstTimestamp);

        engine
            .process_line(b"$GPZDA,120000.00,01,01,2023,00,00*00\r\n")
            .unwrap();
        assert_eq!(engine.state(), ReplayState::Steady);
        assert!(engine.first_timestamp().is_some());
        assert_eq!(engine.stats().timestamps, 1);
        // The timestamp line itself is still transmitted
        assert_eq!(engine.sink().len(), 2);
    }

    #[test]
    fn test_malformed_timestamp_is_fatal() {
        let mut engine = engine(ScriptedDecisions::new(), EngineOptions::default());

        engine.process_line(b"$GPRMC,1,2*00\r\n").unwrap();
        let err = engine
            .process_line(b"$GPZDA,12:00:00,01,01,2023*00\r\n")
            .unwrap_err();

        assert!(matches!(err, ReplayError::Decode { line: 2, .. }));
        // Nothing from the bad line reached the wire
        assert_eq!(engine.sink().len(), 1);
    }

    #[test]
    fn test_excluded_line() {
        let options = EngineOptions {
            exclude: TypeFilter::parse("GSV").unwrap(),
            ..EngineOptions::default()
        };
        let mut engine = engine(ScriptedDecisions::new(), options);

        let outcome = engine.process_line(b"$GPGSV,3,1,11*00\r\n").unwrap();
        assert_eq!(outcome, LineOutcome::Excluded);
        assert!(engine.sink().is_empty());
        assert!(engine.clock().sleeps().is_empty());
        assert_eq!(engine.stats().lines_excluded, 1);
    }

    #[test]
    fn test_excluded_line_does_not_consume_carry() {
        let options = EngineOptions {
            exclude: TypeFilter::parse("GSV").unwrap(),
            ..EngineOptions::default()
        };
        let decisions = ScriptedDecisions::new().events(&[false, true]);
        let mut engine = engine(decisions, options);

        assert_eq!(engine.process_line(b"A\n").unwrap(), LineOutcome::Deferred);
        engine.process_line(b"$GPGSV,3,1,11*00\r\n").unwrap();
        assert_eq!(engine.carry().as_bytes(), b"A\n");

        engine.process_line(b"B\n").unwrap();
        assert_eq!(engine.sink().datagrams(), vec![bytes::Bytes::from_static(b"A\nB\n")]);
    }

    #[test]
    fn test_split_sleeps_after_each_chunk() {
        let decisions = ScriptedDecisions::new().event(true).index(4);
        let mut engine = engine(decisions, EngineOptions::default());

        let outcome = engine.process_line(b"$GPRMC,1,2*00\r\n").unwrap();
        assert_eq!(outcome, LineOutcome::Transmitted { datagrams: 2 });
        assert_eq!(engine.clock().sleeps().len(), 2);
        assert_eq!(engine.stats().splits, 1);
    }

    #[test]
    fn test_split_at_zero_sends_one_datagram() {
        let decisions = ScriptedDecisions::new().event(true).index(0);
        let mut engine = engine(decisions, EngineOptions::default());

        let outcome = engine.process_line(b"$GPRMC,1,2*00\r\n").unwrap();
        assert_eq!(outcome, LineOutcome::Transmitted { datagrams: 1 });
        assert_eq!(engine.sink().len(), 1);
        assert_eq!(engine.clock().sleeps().len(), 2);
    }

    #[test]
    fn test_deferred_line_does_not_sleep() {
        let decisions = ScriptedDecisions::new().events(&[false, true]);
        let mut engine = engine(decisions, EngineOptions::default());

        let outcome = engine.process_line(b"$GPRMC,1,2*00\r\n").unwrap();
        assert_eq!(outcome, LineOutcome::Deferred);
        assert!(engine.clock().sleeps().is_empty());
        assert_eq!(engine.carry().len(), 15);
    }

    #[test]
    fn test_replay_drops_carry_at_end() {
        // Line 1 sent whole, line 2 deferred, then input ends
        let decisions = ScriptedDecisions::new().events(&[false, false, false, true]);
        let mut engine = engine(decisions, EngineOptions::default());

        let input: &[u8] = b"$GPRMC,1*00\r\n$GPRMC,2*00\r\n";
        let outcome = engine.replay(input).unwrap();

        let stats = match outcome {
            ReplayOutcome::EndOfInput(stats) => stats,
            other => panic!("unexpected outcome {:?}", other),
        };
        assert_eq!(stats.lines_read, 2);
        assert_eq!(stats.deferrals, 1);
        assert_eq!(stats.dropped_carry_bytes, 13);
        assert_eq!(engine.sink().concatenated(), b"$GPRMC,1*00\r\n");
    }

    #[test]
    fn test_replay_last_line_without_terminator() {
        let mut engine = engine(ScriptedDecisions::new(), EngineOptions::default());

        let input: &[u8] = b"$GPRMC,1*00\r\n$GPRMC,2*00";
        engine.replay(input).unwrap();

        assert_eq!(engine.sink().len(), 2);
        assert_eq!(engine.sink().datagrams()[1], bytes::Bytes::from_static(b"$GPRMC,2*00"));
    }

    #[test]
    fn test_replay_interrupted() {
        let mut engine = engine(ScriptedDecisions::new(), EngineOptions::default());
        engine.clock().interrupt_after(1);

        let input: &[u8] = b"$GPRMC,1*00\r\n$GPRMC,2*00\r\n$GPRMC,3*00\r\n";
        let outcome = engine.replay(input).unwrap();

        assert!(matches!(outcome, ReplayOutcome::Interrupted(_)));
        assert_eq!(outcome.stats().lines_read, 2);
        assert_eq!(engine.sink().len(), 2);
    }

    #[test]
    fn test_pacing_anomaly_counted() {
        let mut engine = engine(ScriptedDecisions::new(), EngineOptions::default());

        engine
            .process_line(b"$GPZDA,120010.00,01,01,2023,00,00*00\r\n")
            .unwrap();
        engine
            .process_line(b"$GPZDA,120000.00,01,01,2023,00,00*00\r\n")
            .unwrap();

        assert_eq!(engine.stats().pacing_anomalies, 1);
        assert_eq!(engine.interval(), DEFAULT_INTERVAL);
    }

    #[test]
    fn test_reset() {
        let decisions = ScriptedDecisions::new().events(&[false, true]);
        let mut engine = engine(decisions, EngineOptions::default());

        engine
            .process_line(b"$GPZDA,120000.00,01,01,2023,00,00*00\r\n")
            .unwrap();
        assert!(!engine.carry().is_empty());
        assert_eq!(engine.state(), ReplayState::Steady);

        engine.reset();
        assert!(engine.carry().is_empty());
        assert_eq!(engine.state(), ReplayState::AwaitingFirstTimestamp);
        assert!(!engine.estimator().has_sample());
        assert_eq!(engine.stats().lines_read, 0);
    }

    #[test]
    fn test_send_failure_is_fatal() {
        struct FailingSink;

        impl DatagramSink for FailingSink {
            fn send_datagram(&mut self, payload: &[u8]) -> Result<(), SocketError> {
                Err(SocketError::PartialSend {
                    sent: 1,
                    expected: payload.len(),
                })
            }
        }

        let mut engine = ReplayEngine::new(
            FailingSink,
            ScriptedDecisions::new(),
            ManualClock::new(),
            EngineOptions::default(),
        );

        let err = engine.process_line(b"$GPRMC,1*00\r\n").unwrap_err();
        assert!(matches!(
            err,
            ReplayError::Send(SocketError::PartialSend { sent: 1, .. })
        ));
    }
}
