//! The sampler: one seeded bit source plus its configuration.

use log::debug;
use num_bigint::BigInt;
use rand_chacha::ChaCha8Rng;

use crate::bits::{BitSource, CountingBitSource, RngBitSource};
use crate::coin::Coin;
use crate::config::Config;
use crate::error::Result;
use crate::psrn::Psrn;
use crate::rational;
use crate::simulate::{Oracle, Simulator};

/// Entry point bundling a reproducible bit source with a [`Config`].
///
/// The sampler is itself a [`BitSource`], so it can be handed to every
/// algorithm in the crate. It counts the bits it hands out.
///
/// # Examples
///
/// ```
/// use exact_rand::coin::Coin;
/// use exact_rand::factory::Logistic;
/// use exact_rand::rational::RationalCoin;
/// use exact_rand::sampler::Sampler;
///
/// let mut sampler = Sampler::from_seed(7);
/// let mut coin = Logistic::new(RationalCoin::fair(), 1, 1).unwrap();
/// let _heads = coin.flip(&mut sampler);
/// assert!(sampler.bits_consumed() > 0);
/// ```
pub struct Sampler {
    config: Config,
    source: CountingBitSource<RngBitSource<ChaCha8Rng>>,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler {
    /// Sampler seeded from the thread-local generator.
    pub fn new() -> Self {
        Self::from_seed(rand::random())
    }

    /// Sampler with the default configuration and a fixed seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            config: Config::default(),
            source: CountingBitSource::new(RngBitSource::from_seed(seed)),
        }
    }

    pub fn with_config(seed: u64, config: Config) -> Result<Self> {
        config.validate()?;
        debug!("sampler: seed {}, {:?}", seed, config);
        Ok(Self {
            source: CountingBitSource::with_budget(RngBitSource::from_seed(seed), config.bit_budget),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A fresh uniform PSRN on `[0, 1)` in the configured base.
    pub fn new_psrn(&self) -> Psrn {
        Psrn::from_cell(&BigInt::from(0), 0, self.config.base)
    }

    /// `true` with probability `num/den`.
    pub fn zero_or_one<N: Into<BigInt>, D: Into<BigInt>>(&mut self, num: N, den: D) -> Result<bool> {
        rational::zero_or_one(&mut self.source, num, den)
    }

    /// Flips `coin` with this sampler's bits.
    pub fn flip<C: Coin + ?Sized>(&mut self, coin: &mut C) -> bool {
        coin.flip(&mut self.source)
    }

    /// General simulator for `oracle`, using the configured memo size and
    /// first degree.
    pub fn simulator<O: Oracle>(&self, oracle: O) -> Result<Simulator<O>> {
        Simulator::with_config(oracle, &self.config)
    }

    /// Runs `simulator` against `coin` with this sampler's bits.
    pub fn simulate<O: Oracle, C: Coin + ?Sized>(&mut self, simulator: &mut Simulator<O>, coin: &mut C) -> Result<bool> {
        simulator.simulate(coin, &mut self.source)
    }

    /// Number of bits drawn since creation or the last [`reset_count`][Self::reset_count].
    pub fn bits_consumed(&self) -> u64 {
        self.source.count()
    }

    pub fn reset_count(&mut self) {
        self.source.reset();
    }
}

impl BitSource for Sampler {
    fn randbit(&mut self) -> bool {
        self.source.randbit()
    }
}
