use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use simq::prelude::*;

const EVENTS: u64 = 50_000;

fn mm1_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_loop");
    group.sample_size(20);

    for (label, servers, queue) in [("mm1", Some(1), None), ("mm1_loss", Some(1), Some(0)), ("mminf", None, None)] {
        group.bench_with_input(BenchmarkId::new(label, EVENTS), &(servers, queue), |b, &(servers, queue)| {
            b.iter(|| {
                let config = SimConfig::default()
                    .with_seed(42)
                    .with_limits(EVENTS, f64::INFINITY)
                    .with_convergence(u64::MAX / 4, 1, 0.0);
                let spec = ProblemSpec::queueing_system(1.0, 2.0, servers, queue, config);
                let problem = assemble(&spec).expect("problem assembles");
                let result = Simulation::with_clock(problem, ManualClock::new())
                    .run()
                    .expect("simulation runs");
                black_box(result.event_count)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, mm1_events);
criterion_main!(benches);
