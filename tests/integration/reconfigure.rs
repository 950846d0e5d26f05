use crate::*;

use mitts_core::{ConfigError, SourceCredits};
use mitts_services::{
    ConfigChange, Outcome, RegisterBank, RegisterConfigPort, RegisterWrite, RelinquishReport,
    StagedConfig,
};

/// Pop up to the next relinquish fire and deliver it.
fn fire_next<P: ConfigPort>(host: &mut Host<P>) -> RelinquishReport {
    loop {
        let (_, event) = host.queue.pop().expect("relinquish is always armed");
        if let SimEvent::Shaper(e) = event {
            if let Some(report) = host.shaper.on_event(e, &mut host.queue) {
                return report;
            }
        }
    }
}

#[test]
fn test_staged_config_waits_for_boundary() {
    let staged = StagedConfig::new();
    let mut host = Host::start(reference_config(), staged.clone()).unwrap();

    let mut next = ShaperConfig::linear(3, 2, 100, 2, 500);
    next.source_credits = vec![SourceCredits {
        source: 1,
        credits: vec![0, 0, 3],
    }];
    staged.stage(next);

    // Still one source mid-cycle.
    assert!(host.request_at(1, 500).is_err());
    assert!(staged.is_pending());

    // Source 1 only has credit in the coarsest bin.
    let grant = host.request_at(1, 1010).unwrap();
    assert_eq!(grant.tick, 1200);
    assert_eq!(grant.outcome, Outcome::Shaped { bin: 2 });
    assert!(!staged.is_pending());

    // Source 0 takes the new uniform default of 2.
    assert_eq!(host.shaper.dump_bins(0).unwrap()[0].default, 2);
    assert_eq!(host.shaper.next_relinquish_tick(), 1500);
    assert_eq!(host.queue.peek_tick(), Some(1500));
}

#[test]
fn test_shorter_period_takes_effect_on_next_arm() {
    let staged = StagedConfig::new();
    let mut host = Host::start(reference_config(), staged.clone()).unwrap();
    staged.stage(ShaperConfig::linear(3, 1, 100, 1, 250));

    let report = fire_next(&mut host);
    assert!(matches!(report.config, ConfigChange::Applied));
    assert_eq!(report.fired_at, 1000);
    assert_eq!(report.next_relinquish_tick, 1250);

    let report = fire_next(&mut host);
    assert!(matches!(report.config, ConfigChange::Retained));
    assert_eq!(report.fired_at, 1250);
    assert_eq!(report.next_relinquish_tick, 1500);
}

#[test]
fn test_rejected_config_keeps_previous_parameters() {
    let staged = StagedConfig::new();
    let mut host = Host::start(reference_config(), staged.clone()).unwrap();

    let mut bad = ShaperConfig::linear(3, 4, 100, 9, 500);
    bad.bin_count = 0;
    staged.stage(bad);

    let report = fire_next(&mut host);
    assert!(matches!(
        report.config,
        ConfigChange::Rejected(ConfigError::ZeroBinCount)
    ));
    // Taken even though it failed; the next boundary retains.
    assert!(!staged.is_pending());
    assert_eq!(host.shaper.config(), &reference_config());
    assert_eq!(report.next_relinquish_tick, 2000);

    assert!(host.request_at(3, 1010).is_err());
    assert_eq!(host.request_at(0, 1010).unwrap().tick, 1010);
}

#[test]
fn test_register_writes_reshape_at_boundary() {
    let bank = RegisterBank::new(1);
    let mut host = Host::start(reference_config(), RegisterConfigPort::new(bank.clone())).unwrap();

    assert_eq!(bank.write(0, 1, 2), Ok(RegisterWrite::BinCredit { bin: 0 }));
    assert_eq!(bank.write(0, 3, 0), Ok(RegisterWrite::BinCredit { bin: 2 }));
    assert_eq!(bank.dirty_sources(), vec![0]);

    // Mid-cycle the old defaults still hold.
    assert_eq!(host.request_at(0, 10).unwrap().tick, 10);
    assert_eq!(host.shaper.dump_bins(0).unwrap()[0].default, 1);

    assert_eq!(host.request_at(0, 1010).unwrap().tick, 1010);
    assert!(bank.dirty_sources().is_empty());
    let defaults: Vec<_> = host
        .shaper
        .dump_bins(0)
        .unwrap()
        .iter()
        .map(|b| b.default)
        .collect();
    assert_eq!(defaults, vec![2, 1, 0]);

    // Second bin-0 credit, then bin 1, then nothing usable.
    assert_eq!(host.request_at(0, 1020).unwrap().tick, 1020);
    assert_eq!(host.request_at(0, 1030).unwrap().tick, 1120);
    let grant = host.request_at(0, 1040).unwrap();
    assert_eq!(grant.outcome, Outcome::Fallback);
    assert_eq!(grant.tick, 2000);
}

#[test]
fn test_partition_register_does_not_reconfigure() {
    let bank = RegisterBank::new(1);
    let mut host = Host::start(reference_config(), RegisterConfigPort::new(bank.clone())).unwrap();

    bank.write(0, 0, 0b1111).unwrap();
    assert_eq!(
        bank.write(0, 0, 0b0011),
        Ok(RegisterWrite::PartitionMask { released_ways: 0b1100 })
    );

    let report = fire_next(&mut host);
    assert!(matches!(report.config, ConfigChange::Retained));
    assert_eq!(bank.read(0, 0), Ok(0b0011));
}
