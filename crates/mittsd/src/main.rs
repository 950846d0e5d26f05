//! mittsd — replays a request workload through the inter-arrival time shaper
//! and reports the gap distribution it produced.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use mitts_core::MittsConfig;
use mitts_services::{RegisterBank, RegisterConfigPort, Shaper};

mod sim;
mod workload;

use sim::Simulation;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Load config
    if let Err(e) = MittsConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = MittsConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        MittsConfig::default()
    });

    if let Some(trace) = std::env::args().nth(1) {
        config.workload.trace_path = PathBuf::from(trace);
    }

    let workload = if config.workload.trace_path.as_os_str().is_empty() {
        tracing::info!(
            seed = config.workload.seed,
            per_source = config.workload.requests_per_source,
            "using synthetic workload"
        );
        workload::synthetic(&config.workload, config.shaper.source_count)
    } else {
        tracing::info!(path = %config.workload.trace_path.display(), "loading trace");
        workload::load_trace(&config.workload.trace_path).await?
    };

    let bank = RegisterBank::new(config.shaper.source_count);
    let shaper = Shaper::new(config.shaper.clone(), RegisterConfigPort::new(bank.clone()), 0)
        .context("invalid shaper config")?;
    tracing::info!(
        sources = config.shaper.source_count,
        bins = config.shaper.bin_count,
        relinquish_period = config.shaper.relinquish_period,
        requests = workload.requests.len(),
        "mittsd starting"
    );

    let cancel = Arc::new(AtomicBool::new(false));
    let sim = Simulation::new(shaper, bank, config.report.include_bins);
    let mut task = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || sim.run(workload, &cancel)
    });

    let report = tokio::select! {
        joined = &mut task => joined.context("simulation task failed")??,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupt received, stopping simulation");
            cancel.store(true, Ordering::Relaxed);
            task.await.context("simulation task failed")??
        }
    };

    let out = if config.report.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{out}");
    Ok(())
}
