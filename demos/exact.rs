//! Estimates the bias of a few Bernoulli factories and reports their bit cost.
//!
//! Run with:
//! ```bash
//! cargo run --release --example exact -- --trials 100000 --num 1 --den 3
//! ```

use clap::Parser;
use exact_rand::coin::{Coin, FnCoin};
use exact_rand::config::Config;
use exact_rand::factory::{DivOnePlus, Logistic, Power};
use exact_rand::rational::RationalCoin;
use exact_rand::sampler::Sampler;
use exact_rand::series::{cos, exp_minus, sin};
use exact_rand::simulate::FnOracle;
use num_bigint::BigInt;
use num_rational::BigRational;

#[derive(Debug, Parser)]
#[command(author, version, about = "Exact Bernoulli factories")]
struct Cli {
    /// Number of trials per factory
    #[arg(long, default_value = "20000")]
    trials: usize,

    /// Numerator of the input coin's bias
    #[arg(long, default_value = "1")]
    num: i64,

    /// Denominator of the input coin's bias
    #[arg(long, default_value = "2")]
    den: i64,

    /// Seed of the bit source
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Log a warning after this many bits
    #[arg(long)]
    bit_budget: Option<u64>,
}

fn report(name: &str, sampler: &mut Sampler, trials: usize, expected: f64, mut coin: impl Coin) {
    sampler.reset_count();
    let time = std::time::Instant::now();
    let heads = (0..trials).filter(|_| sampler.flip(&mut coin)).count();
    println!(
        "{:>16} {:>10.5} {:>10.5} {:>10.2} {:>10.2}",
        name,
        heads as f64 / trials as f64,
        expected,
        sampler.bits_consumed() as f64 / trials as f64,
        time.elapsed().as_secs_f64() * 1000.0
    );
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let cli = Cli::parse();
    let config = Config {
        bit_budget: cli.bit_budget,
        ..Config::default()
    };
    let mut sampler = Sampler::with_config(cli.seed, config)?;
    let input = RationalCoin::from_ratio(cli.num, cli.den)?;
    let p = cli.num as f64 / cli.den as f64;

    println!("input coin p = {}/{}, {} trials", cli.num, cli.den, cli.trials);
    println!(
        "{:>16} {:>10} {:>10} {:>10} {:>10}",
        "factory", "estimate", "exact", "bits", "time (ms)"
    );
    println!("{}", "-".repeat(60));

    report("p", &mut sampler, cli.trials, p, input.clone());
    report("p/(1+p)", &mut sampler, cli.trials, p / (1.0 + p), Logistic::new(input.clone(), 1, 1)?);
    report("1/(1+p)", &mut sampler, cli.trials, 1.0 / (1.0 + p), DivOnePlus::new(input.clone()));
    report("sqrt(p)", &mut sampler, cli.trials, p.sqrt(), Power::sqrt(input.clone()));

    let mut f = input.clone();
    report(
        "exp(-p)",
        &mut sampler,
        cli.trials,
        (-p).exp(),
        FnCoin(|src: &mut dyn exact_rand::bits::BitSource| exp_minus(&mut f, src)),
    );
    let mut f = input.clone();
    report(
        "cos(p)",
        &mut sampler,
        cli.trials,
        p.cos(),
        FnCoin(|src: &mut dyn exact_rand::bits::BitSource| cos(&mut f, src)),
    );
    let mut f = input.clone();
    report(
        "sin(p)",
        &mut sampler,
        cli.trials,
        p.sin(),
        FnCoin(|src: &mut dyn exact_rand::bits::BitSource| sin(&mut f, src)),
    );

    // The general simulator for p/(1+p), from coefficient bounds alone.
    let ratio = |a: u64, b: u64| BigRational::new(BigInt::from(a), BigInt::from(b));
    let oracle = FnOracle::new(
        move |n, k| ratio(k, n + k),
        move |n, k| ratio(k, n + k) + ratio(1, 2 * n),
    );
    let mut simulator = sampler.simulator(oracle)?;
    let mut f = input.clone();
    sampler.reset_count();
    let mut heads = 0;
    for _ in 0..cli.trials {
        if sampler.simulate(&mut simulator, &mut f)? {
            heads += 1;
        }
    }
    let (hits, misses) = simulator.memo_stats();
    println!(
        "{:>16} {:>10.5} {:>10.5} {:>10.2}",
        "simulated",
        heads as f64 / cli.trials as f64,
        p / (1.0 + p),
        sampler.bits_consumed() as f64 / cli.trials as f64
    );
    println!("memo: {} hits, {} misses", hits, misses);

    Ok(())
}
