//! Fault Injection and Fragmentation
//!
//! Emulates an unreliable link between a sensor bridge and its consumers.
//! Every line goes through a fixed sequence of rare events:
//!
//! 1. corrupt one byte (fault injection only)
//! 2. truncate to a random prefix (fault injection only)
//! 3. split into two datagrams at a random index
//! 4. defer the whole payload so it is prefixed onto the next line
//! 5. otherwise send it whole
//!
//! Splitting and deferral never lose or duplicate bytes; only truncation
//! drops data.

use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// Default odds of each rare event (one in N)
pub const DEFAULT_EVENT_RANGE: u32 = 25;

/// Lowest byte used when corrupting (space)
const PRINTABLE_MIN: u8 = 32;

/// Highest byte used when corrupting (tilde)
const PRINTABLE_MAX: u8 = 126;

/// Source of the random draws behind every fault decision
///
/// Production code uses [`RandomDecisions`]; tests script the outcome with
/// [`ScriptedDecisions`].
pub trait DecisionSource {
    /// Returns true with probability `1 / range`
    fn rare_event(&mut self, range: u32) -> bool;

    /// Uniform index in `[0, upper)`; `upper` is never zero
    fn index_below(&mut self, upper: usize) -> usize;

    /// Uniform printable ASCII byte
    fn printable_ascii(&mut self) -> u8;
}

impl<T: DecisionSource + ?Sized> DecisionSource for &mut T {
    fn rare_event(&mut self, range: u32) -> bool {
        (**self).rare_event(range)
    }

    fn index_below(&mut self, upper: usize) -> usize {
        (**self).index_below(upper)
    }

    fn printable_ascii(&mut self) -> u8 {
        (**self).printable_ascii()
    }
}

/// Decisions drawn from a pseudo-random generator
#[derive(Debug, Clone)]
pub struct RandomDecisions {
    rng: StdRng,
}

impl RandomDecisions {
    /// Seed from operating system entropy
    pub fn from_entropy() -> Self {
        RandomDecisions {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seed deterministically, for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        RandomDecisions {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomDecisions {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl DecisionSource for RandomDecisions {
    fn rare_event(&mut self, range: u32) -> bool {
        range <= 1 || self.rng.gen_range(0..range) == 0
    }

    fn index_below(&mut self, upper: usize) -> usize {
        self.rng.gen_range(0..upper)
    }

    fn printable_ascii(&mut self) -> u8 {
        self.rng.gen_range(PRINTABLE_MIN..=PRINTABLE_MAX)
    }
}

/// Pre-recorded decisions, consumed in order
///
/// Each kind of draw has its own queue. An exhausted queue yields the
/// uneventful answer: no event, index zero, `#`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecisions {
    events: VecDeque<bool>,
    indices: VecDeque<usize>,
    chars: VecDeque<u8>,
}

impl ScriptedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcome of the next rare-event trial
    pub fn event(mut self, fires: bool) -> Self {
        self.events.push_back(fires);
        self
    }

    /// Queue several trial outcomes
    pub fn events(mut self, outcomes: &[bool]) -> Self {
        self.events.extend(outcomes.iter().copied());
        self
    }

    /// Queue the next index draw (clamped to the requested bound)
    pub fn index(mut self, index: usize) -> Self {
        self.indices.push_back(index);
        self
    }

    /// Queue the next replacement character
    pub fn char(mut self, byte: u8) -> Self {
        self.chars.push_back(byte);
        self
    }

    /// Number of trial outcomes not yet consumed
    pub fn remaining_events(&self) -> usize {
        self.events.len()
    }
}

impl DecisionSource for ScriptedDecisions {
    fn rare_event(&mut self, _range: u32) -> bool {
        self.events.pop_front().unwrap_or(false)
    }

    fn index_below(&mut self, upper: usize) -> usize {
        self.indices
            .pop_front()
            .unwrap_or(0)
            .min(upper.saturating_sub(1))
    }

    fn printable_ascii(&mut self) -> u8 {
        self.chars.pop_front().unwrap_or(b'#')
    }
}

/// Fault injection settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultConfig {
    /// Enable corruption and truncation
    pub corrupt: bool,
    /// Odds of each rare event (one in N)
    pub event_range: u32,
}

impl Default for FaultConfig {
    fn default() -> Self {
        FaultConfig {
            corrupt: false,
            event_range: DEFAULT_EVENT_RANGE,
        }
    }
}

/// Bytes deferred from an earlier line
///
/// Empty means nothing is pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarryBuffer {
    pending: BytesMut,
}

impl CarryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pending
    }

    /// Remove and return the pending bytes
    pub fn take(&mut self) -> BytesMut {
        std::mem::take(&mut self.pending)
    }

    /// Drop anything pending
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn defer(&mut self, payload: BytesMut) {
        self.pending = payload;
    }
}

/// A corrupted byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Corruption {
    pub index: usize,
    pub original: u8,
    pub replacement: u8,
}

/// What to put on the wire for one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultAction {
    /// One datagram
    Whole(Bytes),
    /// Two datagrams, `head` then `tail`
    Split { index: usize, head: Bytes, tail: Bytes },
    /// Nothing now; the payload was moved to the carry buffer
    Defer { len: usize },
}

/// Outcome of passing one line through the injector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultDecision {
    pub action: FaultAction,
    pub corruption: Option<Corruption>,
    /// Length the payload was cut to
    pub truncation: Option<usize>,
}

impl FaultDecision {
    /// Chunks to transmit, in order
    pub fn chunks(&self) -> Vec<Bytes> {
        match &self.action {
            FaultAction::Whole(payload) => vec![payload.clone()],
            FaultAction::Split { head, tail, .. } => vec![head.clone(), tail.clone()],
            FaultAction::Defer { .. } => Vec::new(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self.action, FaultAction::Defer { .. })
    }

    pub fn is_split(&self) -> bool {
        matches!(self.action, FaultAction::Split { .. })
    }
}

/// Per-line fault injector
#[derive(Debug, Clone)]
pub struct FaultInjector<D> {
    config: FaultConfig,
    decisions: D,
}

impl<D: DecisionSource> FaultInjector<D> {
    /// Create an injector drawing from the given decision source
    pub fn new(config: FaultConfig, decisions: D) -> Self {
        FaultInjector { config, decisions }
    }

    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// Decide how `carry + line` goes on the wire
    ///
    /// The carry buffer is always consumed; it is refilled only when the
    /// decision is [`FaultAction::Defer`].
    pub fn apply(&mut self, carry: &mut CarryBuffer, line: &[u8]) -> FaultDecision {
        let range = self.config.event_range;
        let mut payload = carry.take();
        payload.extend_from_slice(line);

        let mut corruption = None;
        if self.config.corrupt && !payload.is_empty() && self.decisions.rare_event(range) {
            let index = self.decisions.index_below(payload.len());
            let replacement = self.decisions.printable_ascii();
            corruption = Some(Corruption {
                index,
                original: payload[index],
                replacement,
            });
            payload[index] = replacement;
        }

        let mut truncation = None;
        if self.config.corrupt && !payload.is_empty() && self.decisions.rare_event(range) {
            let len = self.decisions.index_below(payload.len());
            payload.truncate(len);
            truncation = Some(len);
        }

        let action = if !payload.is_empty() && self.decisions.rare_event(range) {
            let index = self.decisions.index_below(payload.len());
            let payload = payload.freeze();
            FaultAction::Split {
                index,
                head: payload.slice(..index),
                tail: payload.slice(index..),
            }
        } else if self.decisions.rare_event(range) {
            let len = payload.len();
            carry.defer(payload);
            FaultAction::Defer { len }
        } else {
            FaultAction::Whole(payload.freeze())
        };

        FaultDecision {
            action,
            corruption,
            truncation,
        }
    }
}
