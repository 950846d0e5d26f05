//! Shaper error types.

use crate::config::ConfigError;
use crate::SourceId;

/// Result type for shaper operations.
pub type ShaperResult<T> = Result<T, ShaperError>;

#[derive(Debug, thiserror::Error)]
pub enum ShaperError {
    /// Rejected configuration. The previously active config stays in force.
    #[error("invalid shaper config: {0}")]
    Config(#[from] ConfigError),

    /// Caller passed a source id the shaper was not built for.
    #[error("source {source_id} out of range (shaper has {source_count} sources)")]
    OutOfRangeSource { source_id: SourceId, source_count: u32 },
}
