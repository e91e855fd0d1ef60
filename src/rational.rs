//! Exact Bernoulli trials of rational probability.
//!
//! [`zero_or_one`] compares the binary expansion of `num/den` against a
//! uniform variate revealed one fair bit at a time, so it never rounds and uses
//! two bits on average whatever the size of the operands.

use log::trace;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use crate::bits::BitSource;
use crate::error::{Error, Result};

/// Exact ratio of arbitrary-precision integers.
pub type Rational = BigRational;

/// Builds `num/den`, rejecting a zero denominator.
pub fn ratio<N: Into<BigInt>, D: Into<BigInt>>(num: N, den: D) -> Result<Rational> {
    let den = den.into();
    if den.is_zero() {
        return Err(Error::invalid("denominator must be non-zero"));
    }
    Ok(Rational::new(num.into(), den))
}

/// Checks that `p` lies in `[0, 1]`.
pub fn check_probability(p: &Rational, what: &str) -> Result<()> {
    if p.is_negative() || *p > Rational::one() {
        return Err(Error::invalid(format!("{} = {} is not in [0, 1]", what, p)));
    }
    Ok(())
}

/// Returns `true` with probability `num/den`.
///
/// Requires `0 <= num <= den` and `den > 0`; both are checked before any bit
/// is drawn.
///
/// # Examples
///
/// ```
/// use exact_rand::bits::RngBitSource;
/// use exact_rand::rational::zero_or_one;
///
/// let mut src = RngBitSource::from_seed(1);
/// assert!(zero_or_one(&mut src, 3, 3).unwrap());
/// assert!(!zero_or_one(&mut src, 0, 3).unwrap());
/// assert!(zero_or_one(&mut src, 4, 3).is_err());
/// ```
pub fn zero_or_one<S, N, D>(src: &mut S, num: N, den: D) -> Result<bool>
where
    S: BitSource + ?Sized,
    N: Into<BigInt>,
    D: Into<BigInt>,
{
    let num = num.into();
    let den = den.into();
    if !den.is_positive() {
        return Err(Error::invalid(format!("denominator {} must be positive", den)));
    }
    if num.is_negative() || num > den {
        return Err(Error::invalid(format!("{}/{} is not in [0, 1]", num, den)));
    }
    Ok(flip_fraction(src, &num, &den))
}

/// Returns `true` with probability `p`, where `p` is checked to be in `[0, 1]`.
pub fn zero_or_one_ratio<S: BitSource + ?Sized>(src: &mut S, p: &Rational) -> Result<bool> {
    check_probability(p, "probability")?;
    Ok(flip(src, p))
}

/// Unchecked [`zero_or_one_ratio`]; `p` must already be known to be in `[0, 1]`.
pub(crate) fn flip<S: BitSource + ?Sized>(src: &mut S, p: &Rational) -> bool {
    flip_fraction(src, p.numer(), p.denom())
}

/// The doubling/fold loop: bit `i` of `num/den` is 1 iff the doubled remainder
/// reaches `den`, and the first bit where the uniform variate differs decides.
fn flip_fraction<S: BitSource + ?Sized>(src: &mut S, num: &BigInt, den: &BigInt) -> bool {
    debug_assert!(!num.is_negative() && num <= den);
    if num == den {
        return true;
    }
    let mut z = num.clone();
    loop {
        if z.is_zero() {
            // Remaining digits of the target are all zero.
            return false;
        }
        z <<= 1u32;
        if z >= *den {
            if !src.randbit() {
                trace!("zero_or_one({}/{}) -> 1", num, den);
                return true;
            }
            z -= den;
        } else if src.randbit() {
            trace!("zero_or_one({}/{}) -> 0", num, den);
            return false;
        }
    }
}

/// Coin with a fixed, known rational bias.
#[derive(Debug, Clone)]
pub struct RationalCoin {
    p: Rational,
}

impl RationalCoin {
    pub fn new(p: Rational) -> Result<Self> {
        check_probability(&p, "probability")?;
        Ok(Self { p })
    }

    pub fn from_ratio<N: Into<BigInt>, D: Into<BigInt>>(num: N, den: D) -> Result<Self> {
        Self::new(ratio(num, den)?)
    }

    pub fn fair() -> Self {
        Self {
            p: Rational::new(BigInt::one(), BigInt::from(2)),
        }
    }

    pub fn probability(&self) -> &Rational {
        &self.p
    }

    pub fn toss<S: BitSource + ?Sized>(&self, src: &mut S) -> bool {
        flip(src, &self.p)
    }
}
