//! Configuration system for MITTS.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $MITTS_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/mitts/config.toml
//!   3. ~/.config/mitts/config.toml

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::{SourceId, Tick};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MittsConfig {
    pub shaper: ShaperConfig,
    pub workload: WorkloadConfig,
    pub report: ReportConfig,
}

/// Shaping parameters. Applied as a unit: at construction, or at a
/// relinquish boundary through a config port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaperConfig {
    pub bin_count: u32,
    pub source_count: u32,
    /// Width of each bin under linear spacing, in ticks.
    pub bin_interval: Tick,
    /// Default credits per bin for sources without an explicit row.
    pub initial_credit: u32,
    /// Ticks between credit refills.
    pub relinquish_period: Tick,
    /// Explicit bin upper bounds. Empty = linear spacing from `bin_interval`.
    pub thresholds: Vec<Tick>,
    /// Per-source default credit rows. Unlisted sources get `initial_credit`.
    pub source_credits: Vec<SourceCredits>,
}

/// Default credit row for one source, one entry per bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCredits {
    pub source: SourceId,
    pub credits: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Request trace, one `source tick` pair per line. Empty = synthetic.
    pub trace_path: PathBuf,
    /// RNG seed for the synthetic workload.
    pub seed: u64,
    /// Synthetic requests generated per source.
    pub requests_per_source: u32,
    /// Mean natural gap between synthetic requests, in ticks.
    pub mean_gap: Tick,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Pretty-print the JSON report.
    pub pretty: bool,
    /// Include the final per-source bin dump.
    pub include_bins: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for MittsConfig {
    fn default() -> Self {
        Self {
            shaper: ShaperConfig::default(),
            workload: WorkloadConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            bin_count: 10,
            source_count: 1,
            bin_interval: 200_000_000,
            initial_credit: 200,
            relinquish_period: 2_000_000_000,
            thresholds: Vec::new(),
            source_credits: Vec::new(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            trace_path: PathBuf::new(),
            seed: 0x4d17_7500,
            requests_per_source: 10_000,
            mean_gap: 150_000_000,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            include_bins: false,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("mitts")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),

    #[error("bin_count must be at least 1")]
    ZeroBinCount,
    #[error("source_count must be at least 1")]
    ZeroSourceCount,
    #[error("bin_interval must be positive")]
    ZeroBinInterval,
    #[error("relinquish_period must be positive")]
    ZeroRelinquishPeriod,
    #[error("bin {index} threshold overflows the tick range")]
    ThresholdOverflow { index: u32 },
    #[error("expected {expected} thresholds, got {actual}")]
    ThresholdCount { expected: u32, actual: usize },
    #[error("first threshold must be positive")]
    ZeroThreshold,
    #[error("threshold {index} ({value}) is not above the previous bound ({prev})")]
    NonMonotonicThresholds { index: usize, prev: Tick, value: Tick },
    #[error("credit row for source {source_id} has {actual} bins, expected {expected}")]
    CreditRowLength {
        source_id: SourceId,
        expected: u32,
        actual: usize,
    },
    #[error("credit row names source {source_id}, but only {source_count} sources exist")]
    UnknownSource { source_id: SourceId, source_count: u32 },
    #[error("credit row for source {source_id} appears twice")]
    DuplicateSource { source_id: SourceId },
}

// ── Validation ────────────────────────────────────────────────────────────────

impl ShaperConfig {
    /// Uniform config with linear bins and no per-source overrides.
    pub fn linear(
        bin_count: u32,
        source_count: u32,
        bin_interval: Tick,
        initial_credit: u32,
        relinquish_period: Tick,
    ) -> Self {
        Self {
            bin_count,
            source_count,
            bin_interval,
            initial_credit,
            relinquish_period,
            thresholds: Vec::new(),
            source_credits: Vec::new(),
        }
    }

    /// Check every constraint a shaper relies on.
    ///
    /// A config that fails here must never reach a shaper; the caller keeps
    /// whatever config was active before.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bin_count == 0 {
            return Err(ConfigError::ZeroBinCount);
        }
        if self.source_count == 0 {
            return Err(ConfigError::ZeroSourceCount);
        }
        if self.bin_interval == 0 {
            return Err(ConfigError::ZeroBinInterval);
        }
        if self.relinquish_period == 0 {
            return Err(ConfigError::ZeroRelinquishPeriod);
        }

        self.thresholds()?;

        let mut seen = HashSet::new();
        for row in &self.source_credits {
            if row.source >= self.source_count {
                return Err(ConfigError::UnknownSource {
                    source_id: row.source,
                    source_count: self.source_count,
                });
            }
            if !seen.insert(row.source) {
                return Err(ConfigError::DuplicateSource { source_id: row.source });
            }
            if row.credits.len() != self.bin_count as usize {
                return Err(ConfigError::CreditRowLength {
                    source_id: row.source,
                    expected: self.bin_count,
                    actual: row.credits.len(),
                });
            }
        }
        Ok(())
    }

    /// Resolve the bin upper bounds, linear unless `thresholds` is set.
    pub fn thresholds(&self) -> Result<Vec<Tick>, ConfigError> {
        if self.thresholds.is_empty() {
            return (0..self.bin_count)
                .map(|i| {
                    Tick::from(i + 1)
                        .checked_mul(self.bin_interval)
                        .ok_or(ConfigError::ThresholdOverflow { index: i })
                })
                .collect();
        }

        if self.thresholds.len() != self.bin_count as usize {
            return Err(ConfigError::ThresholdCount {
                expected: self.bin_count,
                actual: self.thresholds.len(),
            });
        }
        if self.thresholds[0] == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        for (index, pair) in self.thresholds.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(ConfigError::NonMonotonicThresholds {
                    index: index + 1,
                    prev: pair[0],
                    value: pair[1],
                });
            }
        }
        Ok(self.thresholds.clone())
    }

    /// Default credit matrix, indexed `[source][bin]`.
    pub fn default_credits(&self) -> Vec<Vec<u32>> {
        let mut rows =
            vec![vec![self.initial_credit; self.bin_count as usize]; self.source_count as usize];
        for row in &self.source_credits {
            if let Some(slot) = rows.get_mut(row.source as usize) {
                slot.clone_from(&row.credits);
            }
        }
        rows
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl MittsConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            MittsConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("MITTS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&MittsConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply MITTS_* env var overrides. Unparseable values are ignored.
    fn apply_env_overrides(&mut self) {
        fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|v| v.parse().ok())
        }

        if let Some(v) = parsed("MITTS_SHAPER__BIN_COUNT") {
            self.shaper.bin_count = v;
        }
        if let Some(v) = parsed("MITTS_SHAPER__SOURCE_COUNT") {
            self.shaper.source_count = v;
        }
        if let Some(v) = parsed("MITTS_SHAPER__BIN_INTERVAL") {
            self.shaper.bin_interval = v;
        }
        if let Some(v) = parsed("MITTS_SHAPER__INITIAL_CREDIT") {
            self.shaper.initial_credit = v;
        }
        if let Some(v) = parsed("MITTS_SHAPER__RELINQUISH_PERIOD") {
            self.shaper.relinquish_period = v;
        }
        if let Ok(v) = std::env::var("MITTS_WORKLOAD__TRACE") {
            self.workload.trace_path = PathBuf::from(v);
        }
        if let Some(v) = parsed("MITTS_WORKLOAD__SEED") {
            self.workload.seed = v;
        }
    }
}
