use proptest::prelude::*;
use simq::agents::{Buffer, Call, Discipline, RejectReason};
use simq::prelude::*;
use simq::statistics::{dense_distribution, kolmogorov_distance};
use std::collections::BTreeMap;

fn drain(buffer: &mut Buffer) -> Vec<String> {
    std::iter::from_fn(|| buffer.pass_call()).map(|c| c.id().to_string()).collect()
}

fn probability_vector() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..1.0, 1..12).prop_map(|raw| {
        let total: f64 = raw.iter().sum();
        if total > 0.0 { raw.iter().map(|x| x / total).collect() } else { raw }
    })
}

proptest! {
    #[test]
    fn queue_buffer_is_fifo(n in 1usize..50) {
        let mut buffer = Buffer::unbounded("q", Discipline::Queue);
        for i in 0..n {
            buffer.take_call(Call::new(format!("c{i}"))).unwrap();
        }
        let expected: Vec<String> = (0..n).map(|i| format!("c{i}")).collect();
        prop_assert_eq!(drain(&mut buffer), expected);
    }

    #[test]
    fn stack_buffer_is_lifo(n in 1usize..50) {
        let mut buffer = Buffer::unbounded("s", Discipline::Stack);
        for i in 0..n {
            buffer.take_call(Call::new(format!("c{i}"))).unwrap();
        }
        let expected: Vec<String> = (0..n).rev().map(|i| format!("c{i}")).collect();
        prop_assert_eq!(drain(&mut buffer), expected);
    }

    #[test]
    fn bounded_buffer_rejects_exactly_the_overflow(capacity in 1usize..20, offered in 0usize..40) {
        let mut buffer = Buffer::new("q", Discipline::Queue, capacity);
        let mut rejected = 0;
        for i in 0..offered {
            if let Err(r) = buffer.take_call(Call::new(format!("c{i}"))) {
                prop_assert_eq!(r.reason, RejectReason::Capacity);
                rejected += 1;
            }
        }
        prop_assert_eq!(buffer.len(), offered.min(capacity));
        prop_assert_eq!(rejected, offered.saturating_sub(capacity));
    }

    #[test]
    fn distance_to_itself_is_zero(p in probability_vector()) {
        prop_assert_eq!(kolmogorov_distance(&p, &p), Some(0.0));
    }

    #[test]
    fn distance_is_symmetric_and_bounded(p in probability_vector(), q in probability_vector()) {
        let d = kolmogorov_distance(&p, &q).unwrap();
        prop_assert_eq!(Some(d), kolmogorov_distance(&q, &p));
        prop_assert!((0.0..=1.0).contains(&d));
    }

    #[test]
    fn dense_distribution_sums_to_one(weights in prop::collection::btree_map(0usize..30, 0.01f64..10.0, 1..10)) {
        let total: f64 = weights.values().sum();
        let dense = dense_distribution(&weights, total);
        prop_assert_eq!(dense.len(), weights.keys().max().unwrap() + 1);
        prop_assert!((dense.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn model_time_never_runs_backwards(seed in any::<u64>(), steps in 1usize..300) {
        let config = SimConfig::default().with_seed(seed).with_limits(u64::MAX, f64::INFINITY);
        let spec = ProblemSpec::queueing_system(1.0, 1.5, Some(2), Some(3), config);
        let mut sim = Simulation::with_clock(assemble(&spec).unwrap(), ManualClock::new());

        let mut last = 0.0;
        for _ in 0..steps {
            sim.step().unwrap();
            let now = sim.supervisor().now();
            prop_assert!(now >= last);
            last = now;
        }
        prop_assert!((sim.collector().model_time() - last).abs() <= 1e-9 * last.max(1.0));
        prop_assert_eq!(sim.collector().event_count(), steps as u64);

        let occupancy: BTreeMap<usize, f64> = sim.collector().histogram(sim.supervisor().network().find("block").unwrap())
            .cloned()
            .unwrap_or_default();
        prop_assert!(occupancy.keys().all(|&s| s <= 5));
    }
}
