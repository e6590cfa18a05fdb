//! Benchmark for the linear SARSA(λ) hot path
//!
//! Measures Fourier encoding and a full learning update at the feature cap.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use signal_rl_agent::{AgentConfig, FourierBasis, Hyperparameters, Transition, TrueOnlineSarsaLambda};

fn bench_fourier_encode(c: &mut Criterion) {
    // order 3, dimension 6 hits the 500-feature cap
    let basis = FourierBasis::new(3, 6, None);
    let state = [0.1, 0.9, 0.4, 0.0, 0.7, 0.3, 0.5, 0.5];

    c.bench_function("fourier_encode_500", |b| {
        b.iter(|| {
            let features = basis.encode(black_box(&state));
            black_box(features)
        })
    });
}

fn bench_learn_step(c: &mut Criterion) {
    let hp = Hyperparameters::training_defaults();
    let mut agent = TrueOnlineSarsaLambda::new(AgentConfig::new(8, 4, hp)).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let state = [0.1, 0.9, 0.4, 0.0, 0.7, 0.3, 0.5, 0.5];
    let next_state = [0.2, 0.8, 0.4, 0.1, 0.6, 0.3, 0.5, 0.4];

    c.bench_function("sarsa_learn_step", |b| {
        b.iter(|| {
            let delta = agent.learn(
                black_box(&Transition {
                    state: &state,
                    action: 1,
                    reward: -0.5,
                    next_state: &next_state,
                    done: false,
                }),
                &mut rng,
            );
            black_box(delta)
        })
    });
}

criterion_group!(benches, bench_fourier_encode, bench_learn_step);
criterion_main!(benches);
