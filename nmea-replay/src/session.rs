//! Looping playback of a log file
//!
//! A session opens the input, plays it to the end, and when looping is
//! enabled reopens it and starts over with a freshly reset engine.

use crate::engine::{ReplayEngine, ReplayError, ReplayOutcome};
use crate::stats::ReplayStats;
use nmea_io::socket::DatagramSink;
use nmea_io::time::Clock;
use nmea_protocol::fault::DecisionSource;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Playback finished after this many complete passes
    Completed { passes: u64 },
    /// Shutdown was requested during the given pass (1-based)
    Interrupted { pass: u64 },
}

/// File playback, optionally repeated forever
pub struct ReplaySession<S, D, C> {
    engine: ReplayEngine<S, D, C>,
    input: PathBuf,
    loop_playback: bool,
}

impl<S, D, C> ReplaySession<S, D, C>
where
    S: DatagramSink,
    D: DecisionSource,
    C: Clock,
{
    pub fn new(
        engine: ReplayEngine<S, D, C>,
        input: impl Into<PathBuf>,
        loop_playback: bool,
    ) -> Self {
        ReplaySession {
            engine,
            input: input.into(),
            loop_playback,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn engine(&self) -> &ReplayEngine<S, D, C> {
        &self.engine
    }

    /// Run until the input is exhausted (or forever when looping)
    ///
    /// `on_pass` receives the counters of every completed pass.
    pub fn run<F>(&mut self, mut on_pass: F) -> Result<SessionOutcome, ReplayError>
    where
        F: FnMut(u64, &ReplayStats),
    {
        let mut pass = 0u64;
        loop {
            pass += 1;
            if self.engine.clock().is_shutdown() {
                return Ok(SessionOutcome::Interrupted { pass });
            }
            let file = File::open(&self.input).map_err(|source| ReplayError::Open {
                path: self.input.clone(),
                source,
            })?;

            self.engine.reset();
            let stats = match self.engine.replay(BufReader::new(file))? {
                ReplayOutcome::EndOfInput(stats) => stats,
                ReplayOutcome::Interrupted(_) => return Ok(SessionOutcome::Interrupted { pass }),
            };
            on_pass(pass, &stats);

            if !self.loop_playback {
                return Ok(SessionOutcome::Completed { passes: pass });
            }
            // Nothing paces a pass that never transmits
            if stats.datagrams_sent == 0 {
                warn!("Nothing sent from {}, not looping", self.input.display());
                return Ok(SessionOutcome::Completed { passes: pass });
            }
            info!("Reopening {}", self.input.display());
        }
    }
}
