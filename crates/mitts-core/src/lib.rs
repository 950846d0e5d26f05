//! mitts-core — shared types, configuration, and per-source shaping state.
//! All other MITTS crates depend on this one.

pub mod bins;
pub mod config;
pub mod error;
pub mod ledger;
pub mod timeline;

pub use bins::BinTable;
pub use config::{ConfigError, MittsConfig, ShaperConfig, SourceCredits};
pub use error::{ShaperError, ShaperResult};
pub use ledger::CreditLedger;
pub use timeline::SourceTimeline;

/// Simulation time, in ticks. Ticks only move forward.
pub type Tick = u64;

/// Index of a traffic source (one per core), in `[0, source_count)`.
pub type SourceId = u32;
