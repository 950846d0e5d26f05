//! Simulation driver — replays a workload through a shaper on an event queue.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use serde::Serialize;

use mitts_core::Tick;
use mitts_services::{
    BinSnapshot, ConfigChange, EventQueue, GapHistogram, RegisterBank, RegisterConfigPort,
    Scheduler, Shaper, SimEvent,
};

use crate::workload::Workload;

#[derive(Debug, Serialize)]
pub struct SimReport {
    pub end_tick: Tick,
    pub requests: u64,
    pub relinquishes: u64,
    pub reconfigurations: u64,
    pub rejected_configs: u64,
    pub interrupted: bool,
    pub histogram: GapHistogram,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<Vec<Vec<BinSnapshot>>>,
}

pub struct Simulation {
    shaper: Shaper<RegisterConfigPort>,
    bank: RegisterBank,
    queue: EventQueue,
    include_bins: bool,
}

impl Simulation {
    pub fn new(shaper: Shaper<RegisterConfigPort>, bank: RegisterBank, include_bins: bool) -> Self {
        Self {
            shaper,
            bank,
            queue: EventQueue::new(0),
            include_bins,
        }
    }

    /// Run until every request is decided or `cancel` is set.
    pub fn run(mut self, workload: Workload, cancel: &AtomicBool) -> Result<SimReport> {
        for req in &workload.requests {
            self.queue
                .push(req.tick, SimEvent::Request { source: req.source });
        }

        let mut histogram =
            GapHistogram::new(self.shaper.bins().thresholds(), self.shaper.source_count());
        let mut relinquishes = 0;
        let mut reconfigurations = 0;
        let mut rejected_configs = 0;
        let mut interrupted = false;
        let mut pokes = workload.pokes.iter().peekable();

        self.shaper.start(&mut self.queue);
        relinquishes += 1;

        while self.queue.pending_requests() > 0 {
            if cancel.load(Ordering::Relaxed) {
                tracing::warn!(tick = ?self.queue.peek_tick(), "simulation interrupted");
                interrupted = true;
                break;
            }
            let Some((tick, event)) = self.queue.pop() else {
                break;
            };

            while let Some(poke) = pokes.next_if(|p| p.tick <= tick) {
                self.bank
                    .write(poke.source, poke.register, poke.value)
                    .with_context(|| format!("register write at tick {}", poke.tick))?;
            }

            match event {
                SimEvent::Shaper(event) => {
                    let Some(report) = self.shaper.on_event(event, &mut self.queue) else {
                        continue;
                    };
                    relinquishes += 1;
                    match report.config {
                        ConfigChange::Retained => {}
                        ConfigChange::Applied => reconfigurations += 1,
                        ConfigChange::Rejected(_) => rejected_configs += 1,
                    }
                }
                SimEvent::Request { source } => {
                    let grant = self
                        .shaper
                        .decide(source, tick)
                        .with_context(|| format!("request from source {source} at tick {tick}"))?;
                    histogram.record(source, &grant);
                }
            }
        }

        let bins = if self.include_bins {
            let dumps = (0..self.shaper.source_count())
                .map(|s| self.shaper.dump_bins(s))
                .collect::<Result<Vec<_>, _>>()?;
            Some(dumps)
        } else {
            None
        };

        let requests = histogram.total_requests();
        tracing::info!(
            requests,
            relinquishes,
            reconfigurations,
            end_tick = self.queue.current_tick(),
            "simulation finished"
        );

        Ok(SimReport {
            end_tick: self.queue.current_tick(),
            requests,
            relinquishes,
            reconfigurations,
            rejected_configs,
            interrupted,
            histogram,
            bins,
        })
    }
}
