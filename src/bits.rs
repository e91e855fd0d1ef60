//! Sources of independent unbiased bits.
//!
//! Every algorithm in this crate draws its randomness through the [`BitSource`]
//! trait, one fair bit at a time. The order in which bits are consumed is part
//! of the correctness argument of a single logical draw, so a bit source is
//! never shared between threads: create one per thread instead.

use log::{trace, warn};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A source of independent fair bits.
pub trait BitSource {
    /// Returns `true` or `false`, each with probability 1/2.
    fn randbit(&mut self) -> bool;
}

impl<S: BitSource + ?Sized> BitSource for &mut S {
    fn randbit(&mut self) -> bool {
        (**self).randbit()
    }
}

impl<S: BitSource + ?Sized> BitSource for Box<S> {
    fn randbit(&mut self) -> bool {
        (**self).randbit()
    }
}

/// Bit source backed by a [`RngCore`], buffering one `u64` at a time.
pub struct RngBitSource<R> {
    rng: R,
    buffer: u64,
    remaining: u32,
}

impl<R: RngCore> RngBitSource<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            buffer: 0,
            remaining: 0,
        }
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl RngBitSource<ChaCha8Rng> {
    /// Creates a reproducible bit source from a seed.
    pub fn from_seed(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: RngCore> BitSource for RngBitSource<R> {
    fn randbit(&mut self) -> bool {
        if self.remaining == 0 {
            self.buffer = self.rng.next_u64();
            self.remaining = 64;
        }
        let bit = self.buffer & 1 == 1;
        self.buffer >>= 1;
        self.remaining -= 1;
        bit
    }
}

/// Bit source wrapper counting the bits drawn through it.
///
/// An optional budget turns into a single warning once exceeded: there are no
/// timeouts, the budget only helps diagnosing slow-converging draws.
pub struct CountingBitSource<S> {
    inner: S,
    count: u64,
    budget: Option<u64>,
    warned: bool,
}

impl<S: BitSource> CountingBitSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            count: 0,
            budget: None,
            warned: false,
        }
    }

    pub fn with_budget(inner: S, budget: Option<u64>) -> Self {
        Self {
            budget,
            ..Self::new(inner)
        }
    }

    /// Number of bits drawn so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether the budget (if any) has been exceeded.
    pub fn exceeded(&self) -> bool {
        matches!(self.budget, Some(budget) if self.count > budget)
    }

    /// Resets the counter (and re-arms the budget warning).
    pub fn reset(&mut self) {
        self.count = 0;
        self.warned = false;
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: BitSource> BitSource for CountingBitSource<S> {
    fn randbit(&mut self) -> bool {
        self.count += 1;
        if !self.warned && self.exceeded() {
            self.warned = true;
            warn!("bit budget of {:?} exceeded", self.budget);
        }
        self.inner.randbit()
    }
}

/// Uniform integer in `[0, n)`, using the Fast Dice Roller (Lumbroso, 2013).
///
/// Exact: only fair bits are used, and `n == 1` consumes none.
///
/// # Panics
///
/// Panics if `n == 0`.
pub fn uniform_below<S: BitSource + ?Sized>(src: &mut S, n: &BigUint) -> BigUint {
    assert!(!n.is_zero(), "Range should be non-empty");
    if n.is_one() {
        return BigUint::zero();
    }
    let mut v = BigUint::one();
    let mut c = BigUint::zero();
    loop {
        v <<= 1u32;
        c <<= 1u32;
        if src.randbit() {
            c += 1u32;
        }
        if v >= *n {
            if c < *n {
                trace!("uniform_below({}) -> {}", n, c);
                return c;
            }
            v -= n;
            c -= n;
        }
    }
}

/// Uniform digit in `[0, base)`.
///
/// Same algorithm as [`uniform_below`], specialized to machine words.
pub fn uniform_digit<S: BitSource + ?Sized>(src: &mut S, base: u32) -> u32 {
    assert!(base >= 2, "Base should be at least 2");
    if base == 2 {
        return src.randbit() as u32;
    }
    let n = base as u64;
    let mut v: u64 = 1;
    let mut c: u64 = 0;
    loop {
        v <<= 1;
        c = (c << 1) | src.randbit() as u64;
        if v >= n {
            if c < n {
                return c as u32;
            }
            v -= n;
            c -= n;
        }
    }
}

#[cfg(test)]
mod tests {
    use num_traits::ToPrimitive;

    use super::*;

    use test_log::test;

    #[test]
    fn test_rng_bit_source_is_reproducible() {
        let mut a = RngBitSource::from_seed(7);
        let mut b = RngBitSource::from_seed(7);
        for _ in 0..200 {
            assert_eq!(a.randbit(), b.randbit());
        }
    }

    #[test]
    fn test_rng_bit_source_is_balanced() {
        let mut src = RngBitSource::from_seed(1);
        let ones = (0..100_000).filter(|_| src.randbit()).count();
        // 5 standard deviations: 5 * sqrt(100000 / 4) ~ 790
        assert!((49_200..=50_800).contains(&ones), "ones = {}", ones);
    }

    #[test]
    fn test_counting() {
        let mut src = CountingBitSource::with_budget(RngBitSource::from_seed(3), Some(10));
        for _ in 0..10 {
            src.randbit();
        }
        assert_eq!(src.count(), 10);
        assert!(!src.exceeded());
        src.randbit();
        assert!(src.exceeded());
        src.reset();
        assert_eq!(src.count(), 0);
        assert!(!src.exceeded());
    }

    #[test]
    fn test_uniform_below_one_uses_no_bits() {
        let mut src = CountingBitSource::new(RngBitSource::from_seed(5));
        for _ in 0..10 {
            assert_eq!(uniform_below(&mut src, &BigUint::one()), BigUint::zero());
        }
        assert_eq!(src.count(), 0);
    }

    #[test]
    fn test_uniform_below_frequencies() {
        let mut src = RngBitSource::from_seed(11);
        let n = BigUint::from(6u32);
        let mut counts = [0usize; 6];
        for _ in 0..60_000 {
            let x = uniform_below(&mut src, &n);
            assert!(x < n);
            counts[x.to_usize().unwrap()] += 1;
        }
        // Each bucket: mean 10000, sd ~ 91
        for (i, &count) in counts.iter().enumerate() {
            assert!((9_500..=10_500).contains(&count), "bucket {} = {}", i, count);
        }
    }

    #[test]
    fn test_uniform_digit_in_range() {
        let mut src = RngBitSource::from_seed(13);
        let mut seen = [false; 10];
        for _ in 0..1_000 {
            let d = uniform_digit(&mut src, 10);
            assert!(d < 10);
            seen[d as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }
}
