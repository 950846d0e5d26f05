//! Bin table — the interval thresholds shared by every source.
//!
//! Bin `i` covers gaps strictly below `threshold[i]`. Thresholds strictly
//! increase, so scanning bins in index order visits them finest first.

use crate::config::{ConfigError, ShaperConfig};
use crate::Tick;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinTable {
    thresholds: Vec<Tick>,
}

impl BinTable {
    /// Build from a validated config.
    pub fn from_config(config: &ShaperConfig) -> Result<Self, ConfigError> {
        if config.bin_count == 0 {
            return Err(ConfigError::ZeroBinCount);
        }
        if config.thresholds.is_empty() && config.bin_interval == 0 {
            return Err(ConfigError::ZeroBinInterval);
        }
        Ok(Self {
            thresholds: config.thresholds()?,
        })
    }

    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    /// `from_config` rejects `bin_count == 0`, so a built table is never empty.
    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    pub fn threshold(&self, bin: usize) -> Tick {
        self.thresholds[bin]
    }

    pub fn thresholds(&self) -> &[Tick] {
        &self.thresholds
    }

    /// Upper bound of the coarsest bin. Gaps above this pass through unshaped.
    pub fn shapeable_range(&self) -> Tick {
        // Non-empty by construction.
        self.thresholds[self.thresholds.len() - 1]
    }

    /// Finest bin whose threshold exceeds `gap`, ignoring credits.
    pub fn bin_for_gap(&self, gap: Tick) -> Option<usize> {
        let idx = self.thresholds.partition_point(|&t| t <= gap);
        (idx < self.thresholds.len()).then_some(idx)
    }
}
