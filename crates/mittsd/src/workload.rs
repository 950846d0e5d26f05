//! Workloads — the naturally timed requests fed to the shaper.
//!
//! Trace format, one directive per line, `#` starts a comment:
//!
//!   <source> <tick>                              request
//!   reg <tick> <source> <register> <value>       register write
//!
//! Register writes are applied once the simulation clock reaches their tick.

use std::path::Path;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mitts_core::config::WorkloadConfig;
use mitts_core::{SourceId, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub source: SourceId,
    pub tick: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterPoke {
    pub tick: Tick,
    pub source: SourceId,
    pub register: usize,
    pub value: u64,
}

#[derive(Debug, Default)]
pub struct Workload {
    pub requests: Vec<Request>,
    /// Sorted by tick.
    pub pokes: Vec<RegisterPoke>,
}

pub async fn load_trace(path: &Path) -> Result<Workload> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read trace {}", path.display()))?;
    parse_trace(&text).with_context(|| format!("failed to parse trace {}", path.display()))
}

pub fn parse_trace(text: &str) -> Result<Workload> {
    let mut workload = Workload::default();

    for (n, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let lineno = n + 1;

        match fields.as_slice() {
            ["reg", tick, source, register, value] => workload.pokes.push(RegisterPoke {
                tick: parse(tick, lineno, "tick")?,
                source: parse(source, lineno, "source")?,
                register: parse(register, lineno, "register")?,
                value: parse_value(value, lineno)?,
            }),
            [source, tick] => workload.requests.push(Request {
                source: parse(source, lineno, "source")?,
                tick: parse(tick, lineno, "tick")?,
            }),
            _ => bail!("line {lineno}: expected `<source> <tick>` or `reg <tick> <source> <register> <value>`"),
        }
    }

    workload.pokes.sort_by_key(|p| p.tick);
    Ok(workload)
}

fn parse<T: std::str::FromStr>(field: &str, lineno: usize, what: &str) -> Result<T> {
    field
        .parse()
        .ok()
        .with_context(|| format!("line {lineno}: invalid {what} `{field}`"))
}

/// Register values may be written in hex (`0x..`).
fn parse_value(field: &str, lineno: usize) -> Result<u64> {
    match field.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16)
            .with_context(|| format!("line {lineno}: invalid register value `{field}`")),
        None => parse(field, lineno, "register value"),
    }
}

/// Seeded synthetic workload: per source, exponentially distributed natural
/// gaps around `mean_gap`.
pub fn synthetic(config: &WorkloadConfig, source_count: u32) -> Workload {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mean = config.mean_gap.max(1) as f64;
    let mut requests =
        Vec::with_capacity(config.requests_per_source as usize * source_count as usize);

    for source in 0..source_count {
        let mut tick: Tick = 0;
        for _ in 0..config.requests_per_source {
            let u: f64 = rng.gen_range(f64::EPSILON..1.0);
            tick = tick.saturating_add((-u.ln() * mean) as Tick);
            requests.push(Request { source, tick });
        }
    }

    Workload {
        requests,
        pokes: Vec::new(),
    }
}
