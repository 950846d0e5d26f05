//! Relinquish timer — the self-rearming refill cycle.
//!
//! One state ("armed at `next`") and one transition (fire → refill → re-arm).
//! The timer cannot be cancelled; a fire that arrives before the armed tick
//! is a leftover from an earlier arming and is ignored. Once the next fire
//! would fall past `Tick::MAX` the cycle stops for good.

use mitts_core::Tick;

use crate::scheduler::{Scheduler, ShaperEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not started yet.
    Idle,
    Armed { at: Tick },
    /// The next fire would fall past `Tick::MAX`; no further cycles.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct RelinquishTimer {
    period: Tick,
    state: TimerState,
    cycles: u64,
}

impl RelinquishTimer {
    /// `period` must be positive; config validation guarantees it.
    pub fn new(period: Tick) -> Self {
        Self {
            period,
            state: TimerState::Idle,
            cycles: 0,
        }
    }

    pub fn period(&self) -> Tick {
        self.period
    }

    /// Takes effect on the next `arm`.
    pub fn set_period(&mut self, period: Tick) {
        self.period = period;
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Number of times the timer has been armed.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Whether a fire delivered at `now` belongs to the current arming.
    pub fn is_due(&self, now: Tick) -> bool {
        match self.state {
            TimerState::Idle => true,
            TimerState::Armed { at } => now >= at,
            TimerState::Exhausted => false,
        }
    }

    /// Arm for `now + period` and hand the fire to the scheduler.
    ///
    /// Returns `None` and schedules nothing when that tick is not
    /// representable.
    pub fn arm(&mut self, now: Tick, scheduler: &mut dyn Scheduler) -> Option<Tick> {
        let Some(at) = now.checked_add(self.period) else {
            tracing::warn!(now, period = self.period, "relinquish tick overflows, timer stopped");
            self.state = TimerState::Exhausted;
            return None;
        };
        self.state = TimerState::Armed { at };
        self.cycles += 1;
        scheduler.schedule(at, ShaperEvent::Relinquish);
        Some(at)
    }
}
