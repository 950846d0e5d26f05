//! Administrative register bank and the config port built on it.
//!
//! Layout, per source:
//!   reg 0      — cache partition way mask (owned by the cache, not the shaper)
//!   reg 1..=10 — default credits for bins 0..=9 of that source
//!   reg 11..16 — reserved
//!
//! Writing a credit register marks the source dirty. At the next relinquish
//! [`RegisterConfigPort`] folds every dirty source's written registers into a
//! full config; the shaper never sees register addresses.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use static_assertions::const_assert;

use mitts_core::{ShaperConfig, SourceCredits, SourceId};

use crate::config_port::ConfigPort;

pub const REGISTERS_PER_SOURCE: usize = 16;
pub const CACHE_PARTITION_REGISTER: usize = 0;
pub const FIRST_CREDIT_REGISTER: usize = 1;
pub const CREDIT_REGISTER_COUNT: usize = 10;

const_assert!(FIRST_CREDIT_REGISTER + CREDIT_REGISTER_COUNT <= REGISTERS_PER_SOURCE);
const_assert!(REGISTERS_PER_SOURCE <= 16); // written mask is a u16

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("source {source_id} has no registers ({source_count} sources)")]
    SourceOutOfRange { source_id: SourceId, source_count: u32 },
    #[error("register {register} out of range")]
    RegisterOutOfRange { register: usize },
}

/// What a register write touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWrite {
    /// Cache partition mask changed; `released_ways` were given up.
    PartitionMask { released_ways: u64 },
    /// Default credit for `bin` staged for the next relinquish.
    BinCredit { bin: usize },
    Reserved,
}

#[derive(Debug, Clone, Copy, Default)]
struct SourceRegisters {
    values: [u64; REGISTERS_PER_SOURCE],
    written: u16,
}

#[derive(Debug)]
struct Inner {
    source_count: u32,
    regs: DashMap<SourceId, SourceRegisters>,
    dirty: DashSet<SourceId>,
}

/// Flat per-source register space. Cheap to clone; clones share state.
#[derive(Debug, Clone)]
pub struct RegisterBank {
    inner: Arc<Inner>,
}

impl RegisterBank {
    pub fn new(source_count: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                source_count,
                regs: DashMap::new(),
                dirty: DashSet::new(),
            }),
        }
    }

    pub fn source_count(&self) -> u32 {
        self.inner.source_count
    }

    pub fn read(&self, source: SourceId, register: usize) -> Result<u64, RegisterError> {
        self.check(source, register)?;
        Ok(self
            .inner
            .regs
            .get(&source)
            .map_or(0, |r| r.values[register]))
    }

    pub fn write(
        &self,
        source: SourceId,
        register: usize,
        value: u64,
    ) -> Result<RegisterWrite, RegisterError> {
        self.check(source, register)?;
        let mut regs = self.inner.regs.entry(source).or_default();
        let old = regs.values[register];
        regs.values[register] = value;
        regs.written |= 1 << register;
        drop(regs);

        let outcome = match register {
            CACHE_PARTITION_REGISTER => {
                // An unset mask owns no ways, so nothing is released.
                let released_ways = if old != 0 { old & !value } else { 0 };
                tracing::debug!(source, mask = value, released_ways, "cache partition updated");
                RegisterWrite::PartitionMask { released_ways }
            }
            r if (FIRST_CREDIT_REGISTER..FIRST_CREDIT_REGISTER + CREDIT_REGISTER_COUNT)
                .contains(&r) =>
            {
                self.inner.dirty.insert(source);
                let bin = r - FIRST_CREDIT_REGISTER;
                tracing::debug!(source, bin, credits = value, "bin credit staged");
                RegisterWrite::BinCredit { bin }
            }
            _ => RegisterWrite::Reserved,
        };
        Ok(outcome)
    }

    /// Sources with credit writes not yet picked up.
    pub fn dirty_sources(&self) -> Vec<SourceId> {
        let mut sources: Vec<_> = self.inner.dirty.iter().map(|s| *s).collect();
        sources.sort_unstable();
        sources
    }

    /// Credit registers written for `source`, as `(bin, credits)`.
    fn written_credits(&self, source: SourceId) -> Vec<(usize, u64)> {
        let Some(regs) = self.inner.regs.get(&source) else {
            return Vec::new();
        };
        (0..CREDIT_REGISTER_COUNT)
            .filter(|bin| regs.written & (1 << (bin + FIRST_CREDIT_REGISTER)) != 0)
            .map(|bin| (bin, regs.values[bin + FIRST_CREDIT_REGISTER]))
            .collect()
    }

    fn check(&self, source: SourceId, register: usize) -> Result<(), RegisterError> {
        if source >= self.inner.source_count {
            return Err(RegisterError::SourceOutOfRange {
                source_id: source,
                source_count: self.inner.source_count,
            });
        }
        if register >= REGISTERS_PER_SOURCE {
            return Err(RegisterError::RegisterOutOfRange { register });
        }
        Ok(())
    }
}

/// Config port that turns credit register writes into per-source rows.
#[derive(Debug, Clone)]
pub struct RegisterConfigPort {
    bank: RegisterBank,
}

impl RegisterConfigPort {
    pub fn new(bank: RegisterBank) -> Self {
        Self { bank }
    }

    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }
}

impl ConfigPort for RegisterConfigPort {
    fn fetch_config(&mut self, current: &ShaperConfig) -> Option<ShaperConfig> {
        let dirty = self.bank.dirty_sources();
        if dirty.is_empty() {
            return None;
        }

        let defaults = current.default_credits();
        let mut next = current.clone();
        for source in dirty {
            self.bank.inner.dirty.remove(&source);
            let Some(row) = defaults.get(source as usize) else {
                continue;
            };
            let mut row = row.clone();
            for (bin, value) in self.bank.written_credits(source) {
                // Bins past the current table have no slot.
                if let Some(slot) = row.get_mut(bin) {
                    *slot = u32::try_from(value).unwrap_or(u32::MAX);
                }
            }
            match next.source_credits.iter_mut().find(|r| r.source == source) {
                Some(existing) => existing.credits = row,
                None => next.source_credits.push(SourceCredits {
                    source,
                    credits: row,
                }),
            }
        }
        next.source_credits.sort_by_key(|r| r.source);
        Some(next)
    }
}
