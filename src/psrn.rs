//! Partially-sampled random numbers (PSRNs).
//!
//! A PSRN stands for a real number drawn from a continuous distribution whose
//! base-`b` digits are revealed lazily. Only the digits some algorithm actually
//! needed are ever fixed; every digit that is still [`Digit::Unsampled`] is
//! uniform and independent of everything sampled so far.
//!
//! # Representation
//!
//! - a [`Sign`],
//! - a non-negative integer part (always known),
//! - a right-extensible list of fractional digits, each either sampled or not.
//!
//! Once a digit is sampled it never changes. Two algorithms that must agree on
//! one evolving draw share the same PSRN through `&mut` (never a copy), which
//! is why [`Psrn`] does not implement `Clone`.
//!
//! If the first `k` digits are known, the value lies in a closed interval of
//! width `b^-k`: see [`Psrn::bounds`].
//!
//! # Comparisons
//!
//! Comparisons sample digits left to right and stop at the first difference,
//! so they never guess. A PSRN is never reported equal to anything: against a
//! rational whose expansion terminates and agrees with the sampled prefix, the
//! PSRN is reported as lying *farther from zero* than the rational. Equality
//! has probability zero, and this choice samples no further digits.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use log::trace;
use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::bits::{uniform_digit, BitSource};
use crate::error::{Error, Result};
use crate::rational::Rational;

/// A fractional digit of a PSRN.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Digit {
    Unsampled,
    Sampled(u32),
}

impl Digit {
    pub fn value(self) -> Option<u32> {
        match self {
            Digit::Unsampled => None,
            Digit::Sampled(d) => Some(d),
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn flip(self) -> Self {
        match self {
            Sign::Positive => Sign::Negative,
            Sign::Negative => Sign::Positive,
        }
    }

    /// Sign of a product.
    pub fn times(self, other: Sign) -> Self {
        if self == other {
            Sign::Positive
        } else {
            Sign::Negative
        }
    }
}

/// A partially-sampled random number.
#[derive(Debug)]
pub struct Psrn {
    sign: Sign,
    integer: BigUint,
    digits: Vec<Digit>,
    base: u32,
}

impl Default for Psrn {
    fn default() -> Self {
        Psrn::new_uniform()
    }
}

impl Psrn {
    /// Uniform variate on `[0, 1)` in base 2, with no digit sampled yet.
    pub fn new_uniform() -> Self {
        Self {
            sign: Sign::Positive,
            integer: BigUint::zero(),
            digits: Vec::new(),
            base: 2,
        }
    }

    /// Uniform variate on `[0, 1)` in the given base.
    pub fn with_base(base: u32) -> Result<Self> {
        check_base(base)?;
        Ok(Self {
            base,
            ..Self::new_uniform()
        })
    }

    /// Builds a PSRN from its external form.
    pub fn from_parts(sign: Sign, integer: BigUint, digits: Vec<Digit>, base: u32) -> Result<Self> {
        check_base(base)?;
        if let Some(d) = digits.iter().filter_map(|d| d.value()).find(|&d| d >= base) {
            return Err(Error::invalid(format!("digit {} out of range for base {}", d, base)));
        }
        Ok(Self {
            sign,
            integer,
            digits,
            base,
        })
    }

    /// The PSRN uniform on the grid cell `[n, n + 1) * base^-k`.
    ///
    /// Negative cells are stored as sign and magnitude: the cell
    /// `[n, n + 1)` with `n < 0` has magnitude in `(-n - 1, -n]`, which in
    /// distribution is the magnitude cell starting at `-n - 1`.
    pub(crate) fn from_cell(n: &BigInt, k: usize, base: u32) -> Self {
        let (sign, magnitude) = if n.is_negative() {
            (Sign::Negative, (-n - 1u32).magnitude().clone())
        } else {
            (Sign::Positive, n.magnitude().clone())
        };
        let scale = BigUint::from(base).pow(k as u32);
        let (integer, mut fraction) = magnitude.div_rem(&scale);
        let mut digits = vec![Digit::Unsampled; k];
        for slot in digits.iter_mut().rev() {
            let (rest, d) = fraction.div_rem(&BigUint::from(base));
            *slot = Digit::Sampled(d.to_u32().unwrap_or_default());
            fraction = rest;
        }
        Self {
            sign,
            integer,
            digits,
            base,
        }
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    pub fn integer(&self) -> &BigUint {
        &self.integer
    }

    pub fn digits(&self) -> &[Digit] {
        &self.digits
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Negates the value in place (exact, samples nothing).
    pub fn negate(&mut self) {
        self.sign = self.sign.flip();
    }

    /// Number of leading digits that are sampled without a gap.
    pub fn known_prefix(&self) -> usize {
        self.digits
            .iter()
            .position(|d| *d == Digit::Unsampled)
            .unwrap_or(self.digits.len())
    }

    /// Returns the digit at `index`, sampling it first if needed.
    pub fn digit<S: BitSource + ?Sized>(&mut self, src: &mut S, index: usize) -> u32 {
        if index >= self.digits.len() {
            self.digits.resize(index + 1, Digit::Unsampled);
        }
        match self.digits[index] {
            Digit::Sampled(d) => d,
            Digit::Unsampled => {
                let d = uniform_digit(src, self.base);
                trace!("psrn digit[{}] := {}", index, d);
                self.digits[index] = Digit::Sampled(d);
                d
            }
        }
    }

    /// Samples every unsampled digit before the last sampled one and returns
    /// the number of known digits.
    pub fn fill_gaps<S: BitSource + ?Sized>(&mut self, src: &mut S) -> usize {
        let len = self
            .digits
            .iter()
            .rposition(|d| *d != Digit::Unsampled)
            .map_or(0, |i| i + 1);
        self.extend_to(src, len);
        self.digits.truncate(len);
        len
    }

    /// Makes sure the first `len` digits are sampled.
    pub fn extend_to<S: BitSource + ?Sized>(&mut self, src: &mut S, len: usize) {
        for i in 0..len {
            self.digit(src, i);
        }
    }

    /// Samples one more digit after the known prefix.
    pub(crate) fn refine<S: BitSource + ?Sized>(&mut self, src: &mut S) {
        let k = self.known_prefix();
        self.digit(src, k);
    }

    /// Magnitude `m` such that `|value|` lies in `[m, m + 1) * base^-k`, where
    /// `k` is the length of the known prefix.
    pub(crate) fn magnitude_cell(&self) -> (BigUint, usize) {
        let k = self.known_prefix();
        let mut magnitude = self.integer.clone();
        for d in &self.digits[..k] {
            magnitude = magnitude * self.base + d.value().unwrap_or_default();
        }
        (magnitude, k)
    }

    /// Integer `n` such that the value lies in `[n, n + 1) * base^-k`, where `k`
    /// is the length of the known prefix.
    pub(crate) fn cell(&self) -> (BigInt, usize) {
        let (magnitude, k) = self.magnitude_cell();
        let magnitude = BigInt::from(magnitude);
        let n = match self.sign {
            Sign::Positive => magnitude,
            Sign::Negative => -magnitude - 1,
        };
        (n, k)
    }

    /// Closed interval containing `|value|`, implied by the known prefix.
    pub(crate) fn magnitude_bounds(&self) -> (Rational, Rational) {
        let (m, k) = self.magnitude_cell();
        let m = BigInt::from(m);
        let scale = BigInt::from(self.base).pow(k as u32);
        (
            Rational::new(m.clone(), scale.clone()),
            Rational::new(m + 1, scale),
        )
    }

    /// Closed interval `(lo, hi)` containing the value, implied by the known
    /// prefix.
    pub fn bounds(&self) -> (Rational, Rational) {
        let (n, k) = self.cell();
        let scale = BigInt::from(self.base).pow(k as u32);
        (
            Rational::new(n.clone(), scale.clone()),
            Rational::new(n + 1, scale),
        )
    }

    /// Compares two PSRNs, sampling digits of both as needed.
    ///
    /// Returns `Less` or `Greater`, never `Equal`.
    pub fn compare<S: BitSource + ?Sized>(&mut self, other: &mut Psrn, src: &mut S) -> Result<Ordering> {
        if self.base != other.base {
            return Err(Error::BaseMismatch {
                left: self.base,
                right: other.base,
            });
        }
        Ok(self.compare_same_base(other, src))
    }

    /// `true` iff `self < other`; both must share a base.
    pub(crate) fn less_than<S: BitSource + ?Sized>(&mut self, other: &mut Psrn, src: &mut S) -> bool {
        assert_eq!(self.base, other.base, "PSRN bases should match");
        self.compare_same_base(other, src) == Ordering::Less
    }

    fn compare_same_base<S: BitSource + ?Sized>(&mut self, other: &mut Psrn, src: &mut S) -> Ordering {
        if self.sign != other.sign {
            return if self.sign == Sign::Positive {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        let mut magnitude = self.integer.cmp(&other.integer);
        let mut index = 0;
        while magnitude == Ordering::Equal {
            let a = self.digit(src, index);
            let b = other.digit(src, index);
            magnitude = a.cmp(&b);
            index += 1;
        }
        trace!("psrn compare: {:?} after {} digits", magnitude, index);
        self.oriented(magnitude)
    }

    /// Compares the PSRN against an exact rational, sampling digits as needed.
    ///
    /// Returns `Less` or `Greater`, never `Equal` (see the module docs for the
    /// terminating case).
    pub fn compare_to_rational<S: BitSource + ?Sized>(&mut self, r: &Rational, src: &mut S) -> Ordering {
        let r_sign = if r.is_negative() {
            Sign::Negative
        } else {
            Sign::Positive
        };
        if self.sign != r_sign {
            // A zero target counts as positive: a negative PSRN is below it.
            return if self.sign == Sign::Positive {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        let r = r.abs();
        let den = r.denom().magnitude();
        let (q, mut rem) = r.numer().magnitude().div_rem(den);
        let mut magnitude = self.integer.cmp(&q);
        let mut index = 0;
        while magnitude == Ordering::Equal {
            if rem.is_zero() {
                magnitude = Ordering::Greater;
                break;
            }
            rem *= self.base;
            let (rd, rest) = rem.div_rem(den);
            rem = rest;
            let rd = rd.to_u32().unwrap_or_default();
            let d = self.digit(src, index);
            magnitude = d.cmp(&rd);
            index += 1;
        }
        trace!("psrn compare to {}: {:?} after {} digits", r, magnitude, index);
        self.oriented(magnitude)
    }

    /// `true` iff the PSRN is less than `r`.
    pub fn less_than_rational<S: BitSource + ?Sized>(&mut self, r: &Rational, src: &mut S) -> bool {
        self.compare_to_rational(r, src) == Ordering::Less
    }

    fn oriented(&self, magnitude: Ordering) -> Ordering {
        match self.sign {
            Sign::Positive => magnitude,
            Sign::Negative => magnitude.reverse(),
        }
    }

    /// Samples the first `precision` digits and returns the value they spell,
    /// truncated toward zero.
    ///
    /// This consumes the PSRN: the result is a fixed-precision rational and no
    /// longer a sample of the underlying continuous distribution.
    pub fn fill<S: BitSource + ?Sized>(mut self, src: &mut S, precision: usize) -> Rational {
        self.extend_to(src, precision);
        let mut magnitude = BigInt::from(self.integer.clone());
        for d in &self.digits[..precision] {
            magnitude = magnitude * self.base + d.value().unwrap_or_default();
        }
        let value = Rational::new(magnitude, BigInt::from(self.base).pow(precision as u32));
        match self.sign {
            Sign::Positive => value,
            Sign::Negative => -value,
        }
    }

    /// Fills enough digits for 64 bits of precision and converts to `f64`.
    pub fn fill_f64<S: BitSource + ?Sized>(self, src: &mut S) -> f64 {
        let bits_per_digit = (31 - self.base.leading_zeros()) as usize;
        let precision = 64 / bits_per_digit + 1;
        self.fill(src, precision).to_f64().unwrap_or(f64::NAN)
    }

    /// `1 - x` for a positive PSRN in `[0, 1)` with no gaps: complement each
    /// digit, which maps the cell `[c, c + w)` onto `(1 - c - w, 1 - c]`.
    pub(crate) fn complement_fraction(&mut self) {
        assert!(self.sign == Sign::Positive && self.integer.is_zero());
        let k = self.known_prefix();
        self.digits.truncate(k);
        for d in self.digits.iter_mut() {
            if let Digit::Sampled(v) = d {
                *v = self.base - 1 - *v;
            }
        }
    }
}

impl Display for Psrn {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.sign == Sign::Negative {
            write!(f, "-")?;
        }
        write!(f, "{}.", self.integer)?;
        for d in &self.digits {
            match d {
                Digit::Unsampled => write!(f, "?")?,
                Digit::Sampled(v) if self.base <= 36 => {
                    write!(f, "{}", std::char::from_digit(*v, self.base).unwrap_or('#'))?
                }
                Digit::Sampled(v) => write!(f, "[{}]", v)?,
            }
        }
        write!(f, "...")?;
        if self.base != 2 {
            write!(f, " (base {})", self.base)?;
        }
        Ok(())
    }
}

fn check_base(base: u32) -> Result<()> {
    if base < 2 {
        return Err(Error::invalid(format!("base {} must be at least 2", base)));
    }
    Ok(())
}
