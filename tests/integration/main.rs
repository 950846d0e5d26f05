//! MITTS integration test harness.
//!
//! Drives the shaper the way a host does: an event queue supplies the clock,
//! relinquish fires are delivered from the queue, and requests are decided
//! at their natural tick.
//!
//!   cargo test --test integration

use anyhow::{Context, Result};

use mitts_core::{ShaperConfig, SourceId, Tick};
use mitts_services::{ConfigPort, EventQueue, Grant, Shaper, SimEvent};

mod properties;
mod reconfigure;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Bins [100, 200, 300], one credit each, relinquish every 1000 ticks.
pub fn reference_config() -> ShaperConfig {
    ShaperConfig::linear(3, 1, 100, 1, 1000)
}

/// A started shaper and the queue that drives it.
pub struct Host<P: ConfigPort> {
    pub shaper: Shaper<P>,
    pub queue: EventQueue,
}

impl<P: ConfigPort> Host<P> {
    pub fn start(config: ShaperConfig, port: P) -> Result<Self> {
        let mut queue = EventQueue::new(0);
        let mut shaper = Shaper::new(config, port, 0).context("shaper construction failed")?;
        shaper.start(&mut queue);
        Ok(Self { shaper, queue })
    }

    /// Deliver every queued event up to and including `tick`, then decide a
    /// request from `source` at `tick`.
    pub fn request_at(&mut self, source: SourceId, tick: Tick) -> Result<Grant> {
        self.queue.push(tick, SimEvent::Request { source });
        loop {
            let (at, event) = self.queue.pop().context("queue drained early")?;
            match event {
                SimEvent::Shaper(e) => {
                    self.shaper.on_event(e, &mut self.queue);
                }
                SimEvent::Request { source: s } => {
                    return self
                        .shaper
                        .decide(s, at)
                        .with_context(|| format!("decision for source {s} at {at}"));
                }
            }
        }
    }
}

#[test]
fn test_host_starts_with_full_ledger() {
    let host = Host::start(reference_config(), mitts_services::NoReconfigure).unwrap();
    let bins = host.shaper.dump_bins(0).unwrap();
    assert_eq!(bins.len(), 3);
    assert!(bins.iter().all(|b| b.remaining == b.default));
    assert_eq!(host.shaper.next_relinquish_tick(), 1000);
    assert_eq!(host.queue.peek_tick(), Some(1000));
}

#[test]
fn test_bin_dump_serializes() {
    let host = Host::start(reference_config(), mitts_services::NoReconfigure).unwrap();
    let json = serde_json::to_value(host.shaper.dump_bins(0).unwrap()).unwrap();
    assert_eq!(json[2]["threshold"], 300);
    assert_eq!(json[2]["remaining"], 1);
}
