//! Thread-safe shaper handle.
//!
//! Decisions and relinquish both take the one lock, so a refill or a config
//! swap can never interleave with a decision for any source.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use mitts_core::{ShaperResult, SourceId, Tick};

use crate::config_port::{ConfigPort, NoReconfigure};
use crate::scheduler::{Scheduler, ShaperEvent};
use crate::shaper::{BinSnapshot, Grant, RelinquishReport, Shaper};

pub struct SharedShaper<P = NoReconfigure> {
    inner: Arc<Mutex<Shaper<P>>>,
}

impl<P> Clone for SharedShaper<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: ConfigPort> SharedShaper<P> {
    pub fn new(shaper: Shaper<P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(shaper)),
        }
    }

    pub fn request_send_time(&self, source: SourceId, requested: Tick) -> ShaperResult<Tick> {
        self.lock().request_send_time(source, requested)
    }

    pub fn decide(&self, source: SourceId, requested: Tick) -> ShaperResult<Grant> {
        self.lock().decide(source, requested)
    }

    pub fn dump_bins(&self, source: SourceId) -> ShaperResult<Vec<BinSnapshot>> {
        self.lock().dump_bins(source)
    }

    pub fn start(&self, scheduler: &mut dyn Scheduler) -> RelinquishReport {
        self.lock().start(scheduler)
    }

    pub fn on_event(
        &self,
        event: ShaperEvent,
        scheduler: &mut dyn Scheduler,
    ) -> Option<RelinquishReport> {
        self.lock().on_event(event, scheduler)
    }

    pub fn next_relinquish_tick(&self) -> Tick {
        self.lock().next_relinquish_tick()
    }

    /// Run `f` with the shaper locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut Shaper<P>) -> R) -> R {
        f(&mut self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Shaper<P>> {
        self.inner.lock()
    }
}
