//! Inter-arrival time shaper.
//!
//! Each source holds a budget of credits per bin. A request's gap (ticks
//! since the source's last grant) is matched against the bins finest first:
//!
//!   - finest bin that covers the gap and still has credit: grant at
//!     `last + gap`, spending one credit;
//!   - a bin that is too fine or spent pushes the gap up to its threshold,
//!     which delays the grant into the next coarser bin;
//!   - a gap beyond every bin passes through unshaped;
//!   - otherwise every usable bin is spent and the grant waits for the next
//!     relinquish.
//!
//! Grants are never earlier than the natural request.

use serde::Serialize;

use mitts_core::{
    BinTable, ConfigError, CreditLedger, ShaperConfig, ShaperError, ShaperResult, SourceId,
    SourceTimeline, Tick,
};

use crate::config_port::{ConfigPort, NoReconfigure};
use crate::relinquish::RelinquishTimer;
use crate::scheduler::{Scheduler, ShaperEvent};

/// How a request was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Spent a credit from `bin`.
    Shaped { bin: usize },
    /// Gap already beyond the shapeable range.
    PassThrough,
    /// No usable credit left; deferred to the next relinquish.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub requested: Tick,
    pub tick: Tick,
    pub outcome: Outcome,
}

impl Grant {
    /// Ticks added on top of the natural request.
    pub fn delay(&self) -> Tick {
        self.tick.saturating_sub(self.requested)
    }
}

/// One row of `dump_bins`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BinSnapshot {
    pub threshold: Tick,
    pub remaining: u32,
    pub default: u32,
}

/// What a relinquish did with the config port.
#[derive(Debug)]
pub enum ConfigChange {
    Retained,
    Applied,
    Rejected(ConfigError),
}

#[derive(Debug)]
pub struct RelinquishReport {
    pub fired_at: Tick,
    pub next_relinquish_tick: Tick,
    pub config: ConfigChange,
}

pub struct Shaper<P = NoReconfigure> {
    config: ShaperConfig,
    bins: BinTable,
    ledger: CreditLedger,
    timeline: SourceTimeline,
    timer: RelinquishTimer,
    next_relinquish: Tick,
    port: P,
}

impl Shaper<NoReconfigure> {
    /// Shaper with a fixed config.
    pub fn fixed(config: ShaperConfig, now: Tick) -> ShaperResult<Self> {
        Self::new(config, NoReconfigure, now)
    }
}

impl<P: ConfigPort> Shaper<P> {
    /// Build a shaper whose sources all last sent at `now`.
    ///
    /// The refill cycle does not run until [`Shaper::start`]; until then the
    /// exhaustion fallback points one period past `now`.
    pub fn new(config: ShaperConfig, port: P, now: Tick) -> ShaperResult<Self> {
        config.validate()?;
        let bins = BinTable::from_config(&config)?;
        warn_if_range_exceeds_period(&bins, config.relinquish_period);

        Ok(Self {
            ledger: CreditLedger::from_config(&config),
            timeline: SourceTimeline::new(config.source_count as usize, now),
            timer: RelinquishTimer::new(config.relinquish_period),
            next_relinquish: now.saturating_add(config.relinquish_period),
            bins,
            config,
            port,
        })
    }

    /// First relinquish. Seeds the schedule and arms the recurring cycle.
    pub fn start(&mut self, scheduler: &mut dyn Scheduler) -> RelinquishReport {
        tracing::info!(
            tick = scheduler.current_tick(),
            sources = self.config.source_count,
            bins = self.bins.len(),
            "shaper starting"
        );
        self.relinquish(scheduler)
    }

    /// Deliver a scheduled event. Returns `None` for a stale fire.
    pub fn on_event(
        &mut self,
        event: ShaperEvent,
        scheduler: &mut dyn Scheduler,
    ) -> Option<RelinquishReport> {
        match event {
            ShaperEvent::Relinquish => {
                let now = scheduler.current_tick();
                if !self.timer.is_due(now) {
                    tracing::debug!(now, state = ?self.timer.state(), "stale relinquish ignored");
                    return None;
                }
                Some(self.relinquish(scheduler))
            }
        }
    }

    /// Granted send tick for `source`, whose send naturally falls at `requested`.
    pub fn request_send_time(&mut self, source: SourceId, requested: Tick) -> ShaperResult<Tick> {
        self.decide(source, requested).map(|grant| grant.tick)
    }

    /// Like [`Shaper::request_send_time`], but also reports how it was granted.
    pub fn decide(&mut self, source: SourceId, requested: Tick) -> ShaperResult<Grant> {
        let s = self.index(source)?;
        let last = self.timeline.last_send(s);
        let mut gap = self.timeline.gap(s, requested);

        for bin in 0..self.bins.len() {
            let threshold = self.bins.threshold(bin);
            if gap < threshold && self.ledger.try_consume(s, bin) {
                let tick = last.saturating_add(gap);
                self.timeline.set_last_send(s, tick);
                tracing::trace!(source, requested, granted = tick, bin, "shaped");
                return Ok(Grant {
                    requested,
                    tick,
                    outcome: Outcome::Shaped { bin },
                });
            }
            gap = gap.max(threshold);
        }

        if gap > self.bins.shapeable_range() {
            self.timeline.set_last_send(s, requested);
            tracing::trace!(source, requested, "pass-through");
            return Ok(Grant {
                requested,
                tick: requested,
                outcome: Outcome::PassThrough,
            });
        }

        // Equals next_relinquish whenever the host fires relinquish on time.
        let tick = self.next_relinquish.max(last).max(requested);
        self.timeline.set_last_send(s, tick);
        tracing::debug!(
            source,
            requested,
            granted = tick,
            next_relinquish_tick = self.next_relinquish,
            "no credits left in any bin"
        );
        Ok(Grant {
            requested,
            tick,
            outcome: Outcome::Fallback,
        })
    }

    /// Pull the config port, refill credits, reseed timelines, and re-arm.
    pub fn relinquish(&mut self, scheduler: &mut dyn Scheduler) -> RelinquishReport {
        let now = scheduler.current_tick();

        let config = match self.port.fetch_config(&self.config) {
            None => ConfigChange::Retained,
            Some(next) => match self.apply_config(next) {
                Ok(()) => {
                    tracing::info!(
                        tick = now,
                        sources = self.config.source_count,
                        bins = self.bins.len(),
                        relinquish_period = self.config.relinquish_period,
                        "shaper reconfigured"
                    );
                    ConfigChange::Applied
                }
                Err(e) => {
                    tracing::warn!(tick = now, error = %e, "rejected new config, keeping current");
                    ConfigChange::Rejected(e)
                }
            },
        };

        self.ledger.reset();
        self.timeline.reset(self.config.source_count as usize, now);
        // Past the end of the tick range exhausted sources wait forever.
        self.next_relinquish = self.timer.arm(now, scheduler).unwrap_or(Tick::MAX);

        tracing::debug!(tick = now, next_relinquish_tick = self.next_relinquish, "credits relinquished");
        RelinquishReport {
            fired_at: now,
            next_relinquish_tick: self.next_relinquish,
            config,
        }
    }

    /// Read-only view of one source's bins.
    pub fn dump_bins(&self, source: SourceId) -> ShaperResult<Vec<BinSnapshot>> {
        let s = self.index(source)?;
        Ok(self
            .bins
            .thresholds()
            .iter()
            .zip(self.ledger.row(s))
            .zip(self.ledger.default_row(s))
            .map(|((&threshold, &remaining), &default)| BinSnapshot {
                threshold,
                remaining,
                default,
            })
            .collect())
    }

    pub fn last_send_tick(&self, source: SourceId) -> ShaperResult<Tick> {
        let s = self.index(source)?;
        Ok(self.timeline.last_send(s))
    }

    pub fn next_relinquish_tick(&self) -> Tick {
        self.next_relinquish
    }

    pub fn config(&self) -> &ShaperConfig {
        &self.config
    }

    pub fn bins(&self) -> &BinTable {
        &self.bins
    }

    pub fn ledger(&self) -> &CreditLedger {
        &self.ledger
    }

    pub fn source_count(&self) -> u32 {
        self.config.source_count
    }

    pub fn timer(&self) -> &RelinquishTimer {
        &self.timer
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Validate everything first so a rejected config leaves no trace.
    fn apply_config(&mut self, next: ShaperConfig) -> Result<(), ConfigError> {
        next.validate()?;
        let bins = BinTable::from_config(&next)?;
        warn_if_range_exceeds_period(&bins, next.relinquish_period);

        self.ledger.replace_defaults(next.default_credits());
        self.timer.set_period(next.relinquish_period);
        self.bins = bins;
        self.config = next;
        Ok(())
    }

    fn index(&self, source: SourceId) -> ShaperResult<usize> {
        if source < self.config.source_count {
            Ok(source as usize)
        } else {
            Err(ShaperError::OutOfRangeSource {
                source_id: source,
                source_count: self.config.source_count,
            })
        }
    }
}

fn warn_if_range_exceeds_period(bins: &BinTable, period: Tick) {
    if bins.shapeable_range() > period {
        tracing::warn!(
            shapeable_range = bins.shapeable_range(),
            relinquish_period = period,
            "coarsest bin is wider than the relinquish period"
        );
    }
}
