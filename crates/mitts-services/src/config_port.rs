//! Config ports — where a shaper looks for new parameters at each relinquish.
//!
//! A port is pulled exactly once per cycle, before credits are refilled. It
//! returns a complete config or nothing; there is no partial update.

use std::sync::Arc;

use parking_lot::Mutex;

use mitts_core::ShaperConfig;

pub trait ConfigPort {
    /// Non-blocking pull. `current` is the config in force right now.
    fn fetch_config(&mut self, current: &ShaperConfig) -> Option<ShaperConfig>;
}

impl<P: ConfigPort + ?Sized> ConfigPort for Box<P> {
    fn fetch_config(&mut self, current: &ShaperConfig) -> Option<ShaperConfig> {
        (**self).fetch_config(current)
    }
}

/// Never reconfigures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconfigure;

impl ConfigPort for NoReconfigure {
    fn fetch_config(&mut self, _current: &ShaperConfig) -> Option<ShaperConfig> {
        None
    }
}

/// Host-side staging slot. Clone the handle, `stage` a config from anywhere,
/// and the next relinquish takes it.
#[derive(Debug, Clone, Default)]
pub struct StagedConfig {
    pending: Arc<Mutex<Option<ShaperConfig>>>,
}

impl StagedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `config` for the next boundary. Returns a config that was staged
    /// earlier and never picked up.
    pub fn stage(&self, config: ShaperConfig) -> Option<ShaperConfig> {
        self.pending
            .lock()
            .replace(config)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .is_some()
    }
}

impl ConfigPort for StagedConfig {
    fn fetch_config(&mut self, _current: &ShaperConfig) -> Option<ShaperConfig> {
        self.pending
            .lock()
            .take()
    }
}
