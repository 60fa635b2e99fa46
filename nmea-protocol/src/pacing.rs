//! Playback Pacing
//!
//! Derives the interval between sends from the ZDA timestamps embedded in
//! the stream. Each time a timestamp arrives the estimator compares how much
//! recorded time has passed with how much wall-clock time playback took to
//! cover it, and nudges the send interval towards the rate that would make
//! the two match.

use chrono::NaiveDateTime;
use std::time::{Duration, Instant};

/// Interval used before any timestamp has been seen
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);

/// Weight of the newest raw interval in the moving average
pub const EWMA_ALPHA: f64 = 0.2;

/// Lower bound on the smoothed interval
pub const MIN_INTERVAL: Duration = Duration::from_micros(1);

/// Upper bound on the smoothed interval
pub const MAX_INTERVAL: Duration = Duration::from_secs(60);

/// Mutable pacing state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingState {
    /// Current inter-send interval
    pub interval: Duration,
    /// Wall clock at the previous timestamp sentence
    pub last_wall_clock: Option<Instant>,
    /// Data clock at the previous timestamp sentence
    pub last_data_timestamp: Option<NaiveDateTime>,
    /// Chunks sent since the previous timestamp sentence
    pub sent_since_sample: u64,
}

impl PacingState {
    fn new(interval: Duration) -> Self {
        PacingState {
            interval,
            last_wall_clock: None,
            last_data_timestamp: None,
            sent_since_sample: 0,
        }
    }
}

/// Non-monotonic input detected by the estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingAnomaly {
    /// The data timestamp did not advance
    DataClockStalled {
        previous: NaiveDateTime,
        current: NaiveDateTime,
    },
    /// The wall clock did not advance
    WallClockStalled,
}

impl std::fmt::Display for PacingAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacingAnomaly::DataClockStalled { previous, current } => write!(
                f,
                "timestamp {} does not follow previous timestamp {}",
                current, previous
            ),
            PacingAnomaly::WallClockStalled => f.write_str("wall clock did not advance"),
        }
    }
}

/// Result of feeding one timestamp to the estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// First sample of the session; interval unchanged
    First,
    /// Interval recomputed
    Updated {
        /// Data-clock delta divided by wall-clock delta
        ratio: f64,
        /// Interval that would have matched the data clock exactly
        raw_interval: Duration,
        /// New smoothed interval
        interval: Duration,
        /// Chunks sent over the measured span
        sent: u64,
    },
    /// Update skipped; interval unchanged
    Anomaly(PacingAnomaly),
}

/// Closed-loop rate estimator
///
/// `ratio = Δdata / Δwall`; the raw interval is `interval * ratio` and the
/// stored interval moves towards it by [`EWMA_ALPHA`].
#[derive(Debug, Clone)]
pub struct RateEstimator {
    initial_interval: Duration,
    state: PacingState,
}

impl RateEstimator {
    /// Create an estimator starting at the given interval
    pub fn new(initial_interval: Duration) -> Self {
        let initial_interval = initial_interval.clamp(MIN_INTERVAL, MAX_INTERVAL);
        RateEstimator {
            initial_interval,
            state: PacingState::new(initial_interval),
        }
    }

    /// Current inter-send interval
    pub fn interval(&self) -> Duration {
        self.state.interval
    }

    /// Snapshot of the internal state
    pub fn state(&self) -> PacingState {
        self.state
    }

    /// Whether any timestamp has been observed since creation or reset
    pub fn has_sample(&self) -> bool {
        self.state.last_data_timestamp.is_some()
    }

    /// Record that a chunk was placed on the wire
    pub fn on_sent(&mut self) {
        self.state.sent_since_sample += 1;
    }

    /// Feed a timestamp sentence observed at wall-clock `now`
    pub fn observe(&mut self, now: Instant, data_timestamp: NaiveDateTime) -> Observation {
        let observation = match (self.state.last_wall_clock, self.state.last_data_timestamp) {
            (Some(last_wall), Some(last_data)) => {
                self.update_interval(now, last_wall, data_timestamp, last_data)
            }
            _ => Observation::First,
        };

        // Samples advance even when the update was skipped, so a single
        // backwards jump costs one update rather than stalling pacing.
        self.state.last_wall_clock = Some(now);
        self.state.last_data_timestamp = Some(data_timestamp);
        self.state.sent_since_sample = 0;

        observation
    }

    fn update_interval(
        &mut self,
        now: Instant,
        last_wall: Instant,
        data_timestamp: NaiveDateTime,
        last_data: NaiveDateTime,
    ) -> Observation {
        if data_timestamp <= last_data {
            return Observation::Anomaly(PacingAnomaly::DataClockStalled {
                previous: last_data,
                current: data_timestamp,
            });
        }
        if now <= last_wall {
            return Observation::Anomaly(PacingAnomaly::WallClockStalled);
        }

        let data_elapsed = match (data_timestamp - last_data).to_std() {
            Ok(elapsed) => elapsed.as_secs_f64(),
            Err(_) => {
                return Observation::Anomaly(PacingAnomaly::DataClockStalled {
                    previous: last_data,
                    current: data_timestamp,
                })
            }
        };
        let wall_elapsed = now.duration_since(last_wall).as_secs_f64();

        let current = self.state.interval.as_secs_f64();
        let ratio = data_elapsed / wall_elapsed;
        let raw = current * ratio;
        let smoothed = EWMA_ALPHA * raw + (1.0 - EWMA_ALPHA) * current;

        let bounded = smoothed.clamp(MIN_INTERVAL.as_secs_f64(), MAX_INTERVAL.as_secs_f64());
        let interval = Duration::try_from_secs_f64(bounded).unwrap_or(self.state.interval);
        let raw_interval = Duration::try_from_secs_f64(raw).unwrap_or(MAX_INTERVAL);

        self.state.interval = interval;

        Observation::Updated {
            ratio,
            raw_interval,
            interval,
            sent: self.state.sent_since_sample,
        }
    }

    /// Reset to the initial interval with no samples
    pub fn reset(&mut self) {
        self.state = PacingState::new(self.initial_interval);
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}
