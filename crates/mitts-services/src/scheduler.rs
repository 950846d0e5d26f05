//! Discrete-event scheduling.
//!
//! The shaper never owns a clock. It reads the current tick from, and hands
//! its timed work to, whatever implements [`Scheduler`]. [`EventQueue`] is the
//! in-process implementation used by the daemon and the tests.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use mitts_core::{SourceId, Tick};

/// Timed work the shaper asks its host to deliver back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ShaperEvent {
    /// Refill credits and reseed timelines.
    Relinquish,
}

/// The two primitives the shaper needs from its host.
pub trait Scheduler {
    fn current_tick(&self) -> Tick;

    /// Deliver `event` back to the shaper at tick `at`.
    fn schedule(&mut self, at: Tick, event: ShaperEvent);
}

/// Events delivered by an [`EventQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SimEvent {
    Shaper(ShaperEvent),
    /// A source wants to send at the event's tick.
    Request { source: SourceId },
}

impl SimEvent {
    /// Ordering class at equal ticks. Relinquish runs before any request
    /// evaluated at the same tick.
    fn class(&self) -> u8 {
        match self {
            SimEvent::Shaper(ShaperEvent::Relinquish) => 0,
            SimEvent::Request { .. } => 1,
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    at: Tick,
    class: u8,
    seq: u64,
}

/// Deterministic event queue: ordered by tick, then class, then insertion.
/// Keys are unique, so the payload never takes part in ordering.
#[derive(Debug, Default)]
pub struct EventQueue {
    now: Tick,
    seq: u64,
    requests: usize,
    heap: BinaryHeap<Reverse<(Key, SimEvent)>>,
}

impl EventQueue {
    pub fn new(start: Tick) -> Self {
        Self {
            now: start,
            ..Self::default()
        }
    }

    /// Enqueue `event` at `at`. Past ticks are delivered at the current tick.
    pub fn push(&mut self, at: Tick, event: SimEvent) {
        let at = if at < self.now {
            tracing::warn!(at, now = self.now, ?event, "event scheduled in the past");
            self.now
        } else {
            at
        };
        let key = Key {
            at,
            class: event.class(),
            seq: self.seq,
        };
        self.seq += 1;
        if matches!(event, SimEvent::Request { .. }) {
            self.requests += 1;
        }
        self.heap.push(Reverse((key, event)));
    }

    /// Pop the next event and advance the clock to its tick.
    pub fn pop(&mut self) -> Option<(Tick, SimEvent)> {
        let Reverse((key, event)) = self.heap.pop()?;
        if matches!(event, SimEvent::Request { .. }) {
            self.requests -= 1;
        }
        self.now = key.at;
        Some((key.at, event))
    }

    pub fn peek_tick(&self) -> Option<Tick> {
        self.heap.peek().map(|Reverse((key, _))| key.at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Requests still queued. Shaper events re-arm forever, so a host is
    /// done once this reaches zero.
    pub fn pending_requests(&self) -> usize {
        self.requests
    }
}

impl Scheduler for EventQueue {
    fn current_tick(&self) -> Tick {
        self.now
    }

    fn schedule(&mut self, at: Tick, event: ShaperEvent) {
        self.push(at, SimEvent::Shaper(event));
    }
}
