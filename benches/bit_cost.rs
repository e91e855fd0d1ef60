//! Benchmarks for the exact samplers.
//!
//! Besides wall-clock time, each group reports the number of fair bits one
//! draw consumes on average, which is the cost measure the algorithms are
//! designed around.
//!
//! Run with:
//! ```bash
//! cargo bench --bench bit_cost
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use exact_rand::arith::{add, multiply};
use exact_rand::bits::{BitSource, CountingBitSource, RngBitSource};
use exact_rand::coin::{Coin, FnCoin};
use exact_rand::factory::{Linear, Logistic, Power};
use exact_rand::psrn::Psrn;
use exact_rand::rational::{zero_or_one, RationalCoin};
use exact_rand::series::exp_minus;
use num_bigint::BigInt;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const TRIALS: u64 = 10_000;

/// Average bits per draw of `draw` over `TRIALS` draws.
fn bits_per_draw(seed: u64, mut draw: impl FnMut(&mut dyn BitSource)) -> f64 {
    let mut src = CountingBitSource::new(RngBitSource::from_seed(seed));
    for _ in 0..TRIALS {
        draw(&mut src);
    }
    src.count() as f64 / TRIALS as f64
}

// ============================================================================
// Benchmark: Rational coins
// ============================================================================

fn bench_zero_or_one(c: &mut Criterion) {
    let mut group = c.benchmark_group("zero_or_one");

    // Random denominators of growing size.
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    for digits in [2u32, 20, 200] {
        let den = BigInt::from(10).pow(digits) + rng.random_range(1..1000u32);
        let num = &den / 3;
        let cost = bits_per_draw(1, |src| {
            zero_or_one(src, num.clone(), den.clone()).unwrap();
        });
        println!("zero_or_one: 10^{} denominator: {:.3} bits/draw", digits, cost);

        group.bench_with_input(BenchmarkId::from_parameter(digits), &digits, |b, _| {
            let mut src = RngBitSource::from_seed(7);
            b.iter(|| zero_or_one(&mut src, num.clone(), den.clone()).unwrap());
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Bernoulli factories
// ============================================================================

fn bench_factories(c: &mut Criterion) {
    let mut group = c.benchmark_group("factory");
    let input = RationalCoin::from_ratio(1, 4).unwrap();

    let mut factories: Vec<(&str, Box<dyn Coin>)> = vec![
        ("logistic", Box::new(Logistic::new(input.clone(), 1, 1).unwrap())),
        ("linear_x2", Box::new(Linear::new(input.clone(), 2, 1).unwrap())),
        ("sqrt", Box::new(Power::sqrt(input.clone()))),
        (
            "exp_minus",
            Box::new(FnCoin({
                let mut f = input.clone();
                move |src: &mut dyn BitSource| exp_minus(&mut f, src)
            })),
        ),
    ];

    for (name, coin) in factories.iter_mut() {
        let cost = bits_per_draw(2, |src| {
            coin.flip(src);
        });
        println!("{}: {:.3} bits/draw", name, cost);

        group.bench_function(*name, |b| {
            let mut src = RngBitSource::from_seed(3);
            b.iter(|| coin.flip(&mut src));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: PSRN arithmetic
// ============================================================================

fn bench_arith(c: &mut Criterion) {
    let mut group = c.benchmark_group("psrn");

    group.bench_function("add", |b| {
        let mut src = RngBitSource::from_seed(4);
        b.iter(|| {
            let mut x = Psrn::new_uniform();
            let mut y = Psrn::new_uniform();
            add(&mut x, &mut y, &mut src).unwrap()
        });
    });

    group.bench_function("multiply", |b| {
        let mut src = RngBitSource::from_seed(5);
        b.iter(|| {
            let mut x = Psrn::new_uniform();
            let mut y = Psrn::new_uniform();
            multiply(&mut x, &mut y, &mut src).unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_zero_or_one, bench_factories, bench_arith);
criterion_main!(benches);
