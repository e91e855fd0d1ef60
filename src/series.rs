//! Alternating-series Bernoulli factories.
//!
//! A function with an alternating power series
//!
//! ```text
//! g(p) = d_0 - d_1 p + d_2 p^2 - d_3 p^3 + ...,   1 >= d_0 >= d_1 >= ... >= 0
//! ```
//!
//! is simulated by one martingale machine. Term `n` is kept while the first
//! `n` coin flips all land `true`, so the partial sums form a random
//! alternating series whose expectation is `g(p)`, and whose odd and even
//! partial sums bracket its limit. A uniform variate (the "bag", a
//! [`Psrn`]) is compared against the bracket after every term; the draw ends
//! as soon as the bracket no longer straddles it.

use log::trace;
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::bits::BitSource;
use crate::coin::{Coin, Constant, FnCoin};
use crate::error::{Error, Result};
use crate::psrn::{Psrn, Sign};
use crate::rational::{check_probability, Rational, RationalCoin};

/// Runs the martingale machine with a lazily supplied coefficient sequence.
///
/// `d0` is validated before any bit is drawn; later coefficients are checked
/// as they are requested, so an invalid one may surface after bits were
/// consumed.
fn martingale<C, F>(f: &mut C, mut coefficient: F, bag: &mut Psrn, src: &mut dyn BitSource) -> Result<bool>
where
    C: Coin + ?Sized,
    F: FnMut(u64) -> Result<Rational>,
{
    let d0 = coefficient(0)?;
    check_probability(&d0, "d_0")?;

    let mut lower = Rational::zero();
    let mut upper = d0.clone();
    let mut last = d0;
    let mut heads = true;
    let mut n = 1u64;
    loop {
        if bag.less_than_rational(&lower, src) {
            trace!("series: accepted after {} terms", n);
            return Ok(true);
        }
        if !bag.less_than_rational(&upper, src) {
            trace!("series: rejected after {} terms", n);
            return Ok(false);
        }

        let d = coefficient(n)?;
        if d.is_negative() || d > last {
            return Err(Error::invalid(format!(
                "series coefficient d_{} = {} is not in [0, {}]",
                n, d, last
            )));
        }
        if heads {
            heads = f.flip(src);
        }
        let term = if heads { d.clone() } else { Rational::zero() };
        if n % 2 == 1 {
            lower = &upper - term;
        } else {
            upper = &lower + term;
        }
        last = d;
        n += 1;
    }
}

/// `d_0 - d_1 p + d_2 p^2 - ...` with coefficients computed on demand.
///
/// Requires `1 >= d_0 >= d_1 >= ... >= 0` and `d_n -> 0` (otherwise the
/// draw may not terminate). `d_0` is checked up front, the rest lazily.
pub fn alt_series<C, F>(f: &mut C, coefficient: F, src: &mut dyn BitSource) -> Result<bool>
where
    C: Coin + ?Sized,
    F: FnMut(u64) -> Result<Rational>,
{
    let mut bag = Psrn::new_uniform();
    martingale(f, coefficient, &mut bag, src)
}

/// Like [`alt_series`], comparing against a caller-threaded uniform `bag`.
///
/// The bag must be a positive PSRN in `[0, 1)`; the digits sampled here stay
/// with it, so successive calls sharing one bag observe one uniform variate.
pub fn alt_series_with_bag<C, F>(f: &mut C, coefficient: F, bag: &mut Psrn, src: &mut dyn BitSource) -> Result<bool>
where
    C: Coin + ?Sized,
    F: FnMut(u64) -> Result<Rational>,
{
    check_bag(bag)?;
    martingale(f, coefficient, bag, src)
}

fn check_bag(bag: &Psrn) -> Result<()> {
    if bag.sign() == Sign::Negative || !bag.integer().is_zero() {
        return Err(Error::invalid(format!("bag {} is not in [0, 1)", bag)));
    }
    Ok(())
}

/// Alternating series with finitely many non-zero coefficients.
///
/// All coefficients are validated on construction.
#[derive(Debug, Clone)]
pub struct AltSeries {
    coefficients: Vec<Rational>,
}

impl AltSeries {
    pub fn new(coefficients: Vec<Rational>) -> Result<Self> {
        let mut last = Rational::one();
        for (i, d) in coefficients.iter().enumerate() {
            if d.is_negative() || *d > last {
                return Err(Error::invalid(format!(
                    "series coefficient d_{} = {} is not in [0, {}]",
                    i, d, last
                )));
            }
            last = d.clone();
        }
        Ok(Self { coefficients })
    }

    pub fn coefficients(&self) -> &[Rational] {
        &self.coefficients
    }

    /// `true` with probability `sum_n (-1)^n d_n p^n`.
    pub fn flip_with<C: Coin + ?Sized>(&self, f: &mut C, src: &mut dyn BitSource) -> Result<bool> {
        let mut bag = Psrn::new_uniform();
        self.flip_with_bag(f, &mut bag, src)
    }

    /// Like [`flip_with`][Self::flip_with], against a shared bag in `[0, 1)`.
    pub fn flip_with_bag<C: Coin + ?Sized>(&self, f: &mut C, bag: &mut Psrn, src: &mut dyn BitSource) -> Result<bool> {
        check_bag(bag)?;
        let terms = |n: u64| -> Result<Rational> {
            Ok(usize::try_from(n)
                .ok()
                .and_then(|n| self.coefficients.get(n).cloned())
                .unwrap_or_else(Rational::zero))
        };
        martingale(f, terms, bag, src)
    }
}

/// `1 / (n!)`, or `1 / (2n)!` / `1 / (2n + 1)!` with `stride = 2`.
fn inverse_factorials(first: u64, stride: u64) -> impl FnMut(u64) -> Result<Rational> {
    let mut denominator = BigInt::one();
    let mut upto = 0u64;
    for k in 2..=first {
        denominator *= k;
    }
    let mut top = first;
    move |n| {
        while upto < n {
            for _ in 0..stride {
                top += 1;
                denominator *= top;
            }
            upto += 1;
        }
        Ok(Rational::new(BigInt::one(), denominator.clone()))
    }
}

/// `exp(-p)`.
pub fn exp_minus<C: Coin + ?Sized>(f: &mut C, src: &mut dyn BitSource) -> bool {
    let mut bag = Psrn::new_uniform();
    martingale(f, inverse_factorials(0, 1), &mut bag, src).unwrap_or(false)
}

/// `cos(p)`: the series `1 - p^2/2! + p^4/4! - ...` in `p^2`.
pub fn cos<C: Coin + ?Sized>(f: &mut C, src: &mut dyn BitSource) -> bool {
    let mut squared = FnCoin(|src: &mut dyn BitSource| f.flip(src) && f.flip(src));
    let mut bag = Psrn::new_uniform();
    martingale(&mut squared, inverse_factorials(0, 2), &mut bag, src).unwrap_or(false)
}

/// `sin(p)`: `p` times the series `1 - p^2/3! + p^4/5! - ...` in `p^2`.
pub fn sin<C: Coin + ?Sized>(f: &mut C, src: &mut dyn BitSource) -> bool {
    if !f.flip(src) {
        return false;
    }
    let mut squared = FnCoin(|src: &mut dyn BitSource| f.flip(src) && f.flip(src));
    let mut bag = Psrn::new_uniform();
    martingale(&mut squared, inverse_factorials(1, 2), &mut bag, src).unwrap_or(false)
}

/// `true` with probability `exp(-x/y)` for rational `x/y >= 0`.
///
/// Each whole unit of the exponent is an `exp(-1)` trial, and the fractional
/// remainder is [`exp_minus`] over a rational coin.
///
/// # Examples
///
/// ```
/// use exact_rand::bits::RngBitSource;
/// use exact_rand::series::zero_or_one_exp_minus;
///
/// let mut src = RngBitSource::from_seed(3);
/// assert!(zero_or_one_exp_minus(&mut src, 0, 1).unwrap());
/// assert!(zero_or_one_exp_minus(&mut src, -1, 1).is_err());
/// ```
pub fn zero_or_one_exp_minus<N, D>(src: &mut dyn BitSource, x: N, y: D) -> Result<bool>
where
    N: Into<BigInt>,
    D: Into<BigInt>,
{
    let x = x.into();
    let y = y.into();
    if !y.is_positive() {
        return Err(Error::invalid(format!("denominator {} must be positive", y)));
    }
    if x.is_negative() {
        return Err(Error::invalid(format!("exponent {}/{} must be non-negative", x, y)));
    }
    let a = Rational::new(x, y);
    let whole = a
        .trunc()
        .to_integer()
        .to_u64()
        .ok_or_else(|| Error::invalid(format!("exponent {} is too large", a)))?;
    for _ in 0..whole {
        if !exp_minus(&mut Constant(true), src) {
            return Ok(false);
        }
    }
    let fraction = a.fract();
    if fraction.is_zero() {
        return Ok(true);
    }
    let mut coin = RationalCoin::new(fraction)?;
    Ok(exp_minus(&mut coin, src))
}
