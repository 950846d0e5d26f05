//! Per-source timeline — the tick of each source's last granted send.

use crate::Tick;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTimeline {
    last_send: Vec<Tick>,
}

impl SourceTimeline {
    /// Every source starts as if it last sent at `now`.
    pub fn new(source_count: usize, now: Tick) -> Self {
        Self {
            last_send: vec![now; source_count],
        }
    }

    pub fn len(&self) -> usize {
        self.last_send.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_send.is_empty()
    }

    pub fn last_send(&self, source: usize) -> Tick {
        self.last_send[source]
    }

    pub fn set_last_send(&mut self, source: usize, tick: Tick) {
        self.last_send[source] = tick;
    }

    /// Ticks since the last send. A request behind the last grant has gap 0.
    pub fn gap(&self, source: usize, requested: Tick) -> Tick {
        requested.saturating_sub(self.last_send[source])
    }

    /// Reseed every source to `now`, resizing to `source_count`.
    pub fn reset(&mut self, source_count: usize, now: Tick) {
        self.last_send.clear();
        self.last_send.resize(source_count, now);
    }
}
