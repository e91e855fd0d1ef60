//! Sampler configuration.

use crate::error::{Error, Result};

/// Configuration options for a [`Sampler`][crate::sampler::Sampler].
///
/// Use `Config::default()` for standard settings.
///
/// # Examples
///
/// ```
/// use exact_rand::config::Config;
/// use exact_rand::sampler::Sampler;
///
/// let config = Config {
///     base: 10,
///     bit_budget: Some(1 << 20),
///     ..Config::default()
/// };
/// let sampler = Sampler::with_config(42, config).unwrap();
/// let x = sampler.new_psrn();
/// assert_eq!(x.base(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Digit base of PSRNs created by the sampler (default: 2)
    pub base: u32,
    /// Number of bits after which a warning is logged (default: none)
    pub bit_budget: Option<u64>,
    /// The simulator memo table holds `2^memo_bits` entries (default: 12)
    pub memo_bits: usize,
    /// First Bernstein degree of the general simulator (default: 1)
    pub first_degree: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base: 2,
            bit_budget: None,
            memo_bits: 12,
            first_degree: 1,
        }
    }
}

impl Config {
    /// Checks the options for values no sampler or simulator can use.
    pub fn validate(&self) -> Result<()> {
        if self.base < 2 {
            return Err(Error::invalid(format!("base {} must be at least 2", self.base)));
        }
        if self.memo_bits > 31 {
            return Err(Error::invalid(format!("memo_bits {} exceeds 31", self.memo_bits)));
        }
        if self.first_degree == 0 {
            return Err(Error::invalid("first_degree must be positive"));
        }
        Ok(())
    }
}
