//! Credit ledger — remaining credits per source per bin, and the default
//! template they are refilled from.
//!
//! Credits only go down between refills: `try_consume` takes exactly one,
//! `reset` restores the whole matrix to `defaults`. Nothing else writes them,
//! so `0 <= credits[s][b] <= defaults[s][b]` holds at all times.

use crate::config::ShaperConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditLedger {
    credits: Vec<Vec<u32>>,
    defaults: Vec<Vec<u32>>,
}

impl CreditLedger {
    /// Full ledger for a validated config.
    pub fn from_config(config: &ShaperConfig) -> Self {
        let defaults = config.default_credits();
        Self {
            credits: defaults.clone(),
            defaults,
        }
    }

    pub fn source_count(&self) -> usize {
        self.defaults.len()
    }

    pub fn bin_count(&self) -> usize {
        self.defaults.first().map_or(0, Vec::len)
    }

    pub fn remaining(&self, source: usize, bin: usize) -> u32 {
        self.credits[source][bin]
    }

    pub fn default_credit(&self, source: usize, bin: usize) -> u32 {
        self.defaults[source][bin]
    }

    /// Remaining credits of one source, one entry per bin.
    pub fn row(&self, source: usize) -> &[u32] {
        &self.credits[source]
    }

    pub fn default_row(&self, source: usize) -> &[u32] {
        &self.defaults[source]
    }

    /// Take one credit from `bin` if any are left.
    pub fn try_consume(&mut self, source: usize, bin: usize) -> bool {
        let slot = &mut self.credits[source][bin];
        if *slot > 0 {
            *slot -= 1;
            true
        } else {
            false
        }
    }

    /// Refill every source to its default row.
    pub fn reset(&mut self) {
        for (row, defaults) in self.credits.iter_mut().zip(&self.defaults) {
            row.copy_from_slice(defaults);
        }
    }

    /// Swap in a new template and refill from it. Resizes as needed.
    pub fn replace_defaults(&mut self, defaults: Vec<Vec<u32>>) {
        self.credits = defaults.clone();
        self.defaults = defaults;
    }
}
