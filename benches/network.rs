use criterion::{Criterion, black_box, criterion_group, criterion_main};

use stochastic_mlp::{Activation, Network, StochasticArithmetic};

fn network_forward_bench(c: &mut Criterion) {
    let net = Network::new_with_seed(&[256, 10, 10], Activation::Sigmoid, 0).unwrap();
    let mut scratch = net.scratch();
    let input = vec![0.5_f64; net.input_units()];

    c.bench_function("network_forward_256_10_10", |b| {
        b.iter(|| {
            let out = net.forward(black_box(&input), &mut scratch);
            black_box(out);
        })
    });
}

fn network_train_step_bench(c: &mut Criterion) {
    let mut net = Network::new_with_seed(&[256, 10, 10], Activation::Sigmoid, 0).unwrap();
    let mut trainer = net.trainer();
    let input = vec![0.5_f64; net.input_units()];

    c.bench_function("network_train_step_256_10_10", |b| {
        b.iter(|| {
            let loss = net.train_step(black_box(&input), 3, 0.1, &mut trainer);
            black_box(loss);
        })
    });
}

fn stochastic_multiply_bench(c: &mut Criterion) {
    let mut sc = StochasticArithmetic::with_seed(1024, 0).unwrap();

    c.bench_function("stochastic_multiply_1024", |b| {
        b.iter(|| {
            let p = sc.multiply(black_box(0.5531), black_box(-0.0025021)).unwrap();
            black_box(p);
        })
    });
}

criterion_group!(
    benches,
    network_forward_bench,
    network_train_step_bench,
    stochastic_multiply_bench
);
criterion_main!(benches);
