//! Randomized checks of the shaper's invariants. Seeds are fixed so a failure
//! reproduces.

use crate::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use mitts_services::{NoReconfigure, Outcome, Scheduler};

const SEEDS: [u64; 4] = [1, 7, 0x5eed, 0xdead_beef];

fn random_config(rng: &mut StdRng) -> ShaperConfig {
    let bin_count = rng.gen_range(1..=8);
    let bin_interval = rng.gen_range(1..=500);
    let mut config = ShaperConfig::linear(
        bin_count,
        rng.gen_range(1..=4),
        bin_interval,
        rng.gen_range(0..=5),
        // Long enough that a single run stays inside one cycle.
        1_000_000_000,
    );
    if rng.gen_bool(0.5) {
        let mut t = 0;
        config.thresholds = (0..bin_count)
            .map(|_| {
                t += rng.gen_range(1..=400);
                t
            })
            .collect();
    }
    config
}

fn fixed_shaper(config: ShaperConfig) -> (Shaper<NoReconfigure>, EventQueue) {
    let mut queue = EventQueue::new(0);
    let mut shaper = Shaper::fixed(config, 0).unwrap();
    shaper.start(&mut queue);
    (shaper, queue)
}

fn assert_credit_bound(shaper: &Shaper<NoReconfigure>) {
    for s in 0..shaper.source_count() {
        for bin in shaper.dump_bins(s).unwrap() {
            assert!(bin.remaining <= bin.default, "credit above default: {bin:?}");
        }
    }
}

#[test]
fn test_credits_stay_within_defaults() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = random_config(&mut rng);
        let (mut shaper, mut queue) = fixed_shaper(config.clone());

        for _ in 0..500 {
            let source = rng.gen_range(0..config.source_count);
            let tick = rng.gen_range(0..5_000);
            shaper.request_send_time(source, tick).unwrap();
            assert_credit_bound(&shaper);
            if rng.gen_ratio(1, 50) {
                shaper.relinquish(&mut queue);
                assert_credit_bound(&shaper);
            }
        }
    }
}

#[test]
fn test_grants_never_move_backwards_within_a_cycle() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = random_config(&mut rng);
        let (mut shaper, _queue) = fixed_shaper(config.clone());

        let mut last = vec![0; config.source_count as usize];
        let mut natural = vec![0u64; config.source_count as usize];
        for _ in 0..500 {
            let source = rng.gen_range(0..config.source_count);
            let s = source as usize;
            // Natural ticks wander, sometimes behind the previous grant.
            natural[s] += rng.gen_range(0..300);
            let requested = natural[s].saturating_sub(rng.gen_range(0..100));

            let grant = shaper.decide(source, requested).unwrap();
            assert!(grant.tick >= last[s], "seed {seed}: {grant:?} after {}", last[s]);
            assert!(grant.tick >= requested, "seed {seed}: granted early {grant:?}");
            last[s] = grant.tick;
        }
    }
}

#[test]
fn test_gap_past_range_passes_through() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = random_config(&mut rng);
        let (mut shaper, _queue) = fixed_shaper(config.clone());
        let range = shaper.bins().shapeable_range();

        for _ in 0..100 {
            let source = rng.gen_range(0..config.source_count);
            // Burn some credits first so the ledger state is arbitrary.
            let last = shaper.last_send_tick(source).unwrap();
            shaper
                .request_send_time(source, last + rng.gen_range(0..range))
                .unwrap();

            let last = shaper.last_send_tick(source).unwrap();
            let requested = last + range + rng.gen_range(1..1_000);
            let grant = shaper.decide(source, requested).unwrap();
            assert_eq!(grant.tick, requested);
            assert_eq!(grant.outcome, Outcome::PassThrough);
            assert_eq!(shaper.last_send_tick(source).unwrap(), requested);
        }
    }
}

#[test]
fn test_ample_credit_grants_unmodified() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let config = random_config(&mut rng);
        let (mut shaper, _queue) = fixed_shaper(config.clone());
        let range = shaper.bins().shapeable_range();

        for _ in 0..300 {
            let source = rng.gen_range(0..config.source_count);
            let last = shaper.last_send_tick(source).unwrap();
            let gap = rng.gen_range(0..range);
            let requested = last + gap;

            let bin = shaper.bins().bin_for_gap(gap).unwrap();
            let has_credit = shaper.dump_bins(source).unwrap()[bin].remaining > 0;

            let grant = shaper.decide(source, requested).unwrap();
            if has_credit {
                assert_eq!(grant.tick, requested, "seed {seed}");
                assert_eq!(grant.outcome, Outcome::Shaped { bin });
            } else {
                assert!(grant.tick >= requested, "seed {seed}: granted early {grant:?}");
                assert_ne!(grant.outcome, Outcome::Shaped { bin }, "seed {seed}");
            }
        }
    }
}

#[test]
fn test_relinquish_restores_defaults_and_advances_one_period() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut config = random_config(&mut rng);
        config.relinquish_period = rng.gen_range(1..10_000);
        let (mut shaper, mut queue) = fixed_shaper(config.clone());
        let defaults = config.default_credits();

        for _ in 0..5 {
            for _ in 0..rng.gen_range(0..50) {
                let source = rng.gen_range(0..config.source_count);
                shaper
                    .request_send_time(source, rng.gen_range(0..20_000))
                    .unwrap();
            }

            // Deliver the armed fire.
            let (at, _) = queue.pop().unwrap();
            assert_eq!(at, shaper.next_relinquish_tick());
            let report = shaper
                .on_event(mitts_services::ShaperEvent::Relinquish, &mut queue)
                .unwrap();

            assert_eq!(report.next_relinquish_tick, at + config.relinquish_period);
            assert_eq!(queue.current_tick(), at);
            for s in 0..config.source_count {
                let remaining: Vec<_> = shaper
                    .dump_bins(s)
                    .unwrap()
                    .iter()
                    .map(|b| b.remaining)
                    .collect();
                assert_eq!(remaining, defaults[s as usize]);
                assert_eq!(shaper.last_send_tick(s).unwrap(), at);
            }
        }
    }
}
