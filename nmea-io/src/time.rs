//! Wall clock and pacing sleep
//!
//! Playback reads the wall clock to compare against recorded timestamps and
//! sleeps between sends. Both go through [`Clock`] so tests can run on a
//! simulated timeline. The real clock's sleep wakes early when a
//! [`ShutdownTrigger`] fires.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a pacing sleep ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// The full duration elapsed
    Elapsed,
    /// Shutdown was requested
    Interrupted,
}

/// Source of wall-clock time and pacing sleeps
pub trait Clock {
    /// Current wall-clock instant
    fn now(&self) -> Instant;

    /// Block for `duration` unless shutdown is requested first
    fn sleep(&mut self, duration: Duration) -> SleepOutcome;

    /// Whether shutdown has been requested, without blocking
    fn is_shutdown(&self) -> bool;
}

impl<T: Clock + ?Sized> Clock for &mut T {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&mut self, duration: Duration) -> SleepOutcome {
        (**self).sleep(duration)
    }

    fn is_shutdown(&self) -> bool {
        (**self).is_shutdown()
    }
}

/// Create a connected shutdown trigger/listener pair
///
/// Firing the trigger, or dropping every clone of it, wakes all listeners
/// and keeps them woken.
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownListener) {
    let (sender, receiver) = channel::bounded(0);
    (
        ShutdownTrigger {
            sender: Arc::new(Mutex::new(Some(sender))),
        },
        ShutdownListener { receiver },
    )
}

/// Requests shutdown
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    sender: Arc<Mutex<Option<Sender<()>>>>,
}

impl ShutdownTrigger {
    /// Fire the trigger; idempotent
    pub fn trigger(&self) {
        // Dropping the only sender disconnects every receiver
        self.sender.lock().take();
    }

    pub fn is_triggered(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// Observes shutdown requests
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    receiver: Receiver<()>,
}

impl ShutdownListener {
    /// Wait up to `timeout`, returning early on shutdown
    pub fn wait_timeout(&self, timeout: Duration) -> SleepOutcome {
        match self.receiver.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => SleepOutcome::Elapsed,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => SleepOutcome::Interrupted,
        }
    }

    pub fn is_shutdown(&self) -> bool {
        match self.receiver.try_recv() {
            Err(TryRecvError::Empty) => false,
            Ok(()) | Err(TryRecvError::Disconnected) => true,
        }
    }
}

/// The real wall clock
#[derive(Debug, Clone)]
pub struct SystemClock {
    shutdown: Option<ShutdownListener>,
}

impl SystemClock {
    /// A clock whose sleeps cannot be interrupted
    pub fn new() -> Self {
        SystemClock { shutdown: None }
    }

    /// A clock whose sleeps end early on shutdown
    pub fn with_shutdown(listener: ShutdownListener) -> Self {
        SystemClock {
            shutdown: Some(listener),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&mut self, duration: Duration) -> SleepOutcome {
        match &self.shutdown {
            Some(listener) => listener.wait_timeout(duration),
            None => {
                std::thread::sleep(duration);
                SleepOutcome::Elapsed
            }
        }
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|listener| listener.is_shutdown())
    }
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    sleeps: Vec<Duration>,
    interrupt_after: Option<usize>,
}

/// Simulated clock that only moves when slept on or advanced
///
/// Clones share one timeline, so a test can keep a handle to inspect the
/// sleeps while the engine owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            state: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                sleeps: Vec::new(),
                interrupt_after: None,
            })),
        }
    }

    /// Move the clock forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        self.state.lock().now += duration;
    }

    /// Report shutdown from the sleep after `count` completed sleeps
    pub fn interrupt_after(&self, count: usize) {
        self.state.lock().interrupt_after = Some(count);
    }

    /// Every completed sleep, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.lock().sleeps.clone()
    }

    /// Sum of all completed sleeps
    pub fn total_slept(&self) -> Duration {
        self.state.lock().sleeps.iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state.lock().now
    }

    fn sleep(&mut self, duration: Duration) -> SleepOutcome {
        let mut state = self.state.lock();
        if state.interrupt_after == Some(state.sleeps.len()) {
            return SleepOutcome::Interrupted;
        }
        state.now += duration;
        state.sleeps.push(duration);
        SleepOutcome::Elapsed
    }

    fn is_shutdown(&self) -> bool {
        let state = self.state.lock();
        state
            .interrupt_after
            .is_some_and(|count| state.sleeps.len() >= count)
    }
}
