//! Gap histogram — the inter-arrival distribution a shaper actually produced.
//!
//! Gaps between consecutive grants of a source are bucketed with the same
//! thresholds the shaper uses, plus one overflow bucket for gaps past the
//! shapeable range.

use serde::Serialize;

use mitts_core::{SourceId, Tick};

use crate::shaper::{Grant, Outcome};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStats {
    /// Grants per bin, by gap since the previous grant.
    pub bins: Vec<u64>,
    /// Grants whose gap exceeded every threshold.
    pub overflow: u64,
    pub shaped: u64,
    pub pass_through: u64,
    pub fallback: u64,
    /// Sum of ticks added on top of the natural requests.
    pub total_delay: u64,
    #[serde(skip)]
    last_grant: Option<Tick>,
}

impl SourceStats {
    pub fn requests(&self) -> u64 {
        self.shaped + self.pass_through + self.fallback
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GapHistogram {
    pub thresholds: Vec<Tick>,
    pub sources: Vec<SourceStats>,
}

impl GapHistogram {
    pub fn new(thresholds: &[Tick], source_count: u32) -> Self {
        let empty = SourceStats {
            bins: vec![0; thresholds.len()],
            ..SourceStats::default()
        };
        Self {
            thresholds: thresholds.to_vec(),
            sources: vec![empty; source_count as usize],
        }
    }

    /// Record a grant. Sources added by a reconfiguration get a fresh row.
    pub fn record(&mut self, source: SourceId, grant: &Grant) {
        let idx = source as usize;
        if idx >= self.sources.len() {
            let empty = SourceStats {
                bins: vec![0; self.thresholds.len()],
                ..SourceStats::default()
            };
            self.sources.resize(idx + 1, empty);
        }
        let thresholds = &self.thresholds;
        let stats = &mut self.sources[idx];

        match grant.outcome {
            Outcome::Shaped { .. } => stats.shaped += 1,
            Outcome::PassThrough => stats.pass_through += 1,
            Outcome::Fallback => stats.fallback += 1,
        }
        stats.total_delay = stats.total_delay.saturating_add(grant.delay());

        if let Some(prev) = stats.last_grant {
            let gap = grant.tick.saturating_sub(prev);
            match thresholds.iter().position(|&t| gap < t) {
                Some(bin) => stats.bins[bin] += 1,
                None => stats.overflow += 1,
            }
        }
        stats.last_grant = Some(grant.tick);
    }

    pub fn total_requests(&self) -> u64 {
        self.sources.iter().map(SourceStats::requests).sum()
    }
}
