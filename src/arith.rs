//! Exact arithmetic on partially-sampled random numbers.
//!
//! Each operation returns a new PSRN distributed *exactly* as the combination
//! of its operands, without ever materializing them. The operands are only
//! touched to close gaps in their known prefixes (and, for products, to move
//! them away from zero); those digits are fixed permanently like any other.
//!
//! All four operations share one scheme: the operands' known prefixes pin the
//! result to an interval whose density is known in closed form, a candidate is
//! drawn as a PSRN uniform over that interval, and it is accepted or rejected
//! by comparisons that sample digits only until they are decided. A decision
//! never depends on a digit that is still unsampled, so the accepted
//! candidate's remaining digits stay uniform.
//!
//! - [`add`] / [`subtract`]: the sum of two cells of equal width has a
//!   triangular density over the doubled width.
//! - [`multiply`]: the product of two cells has a three-region density; the
//!   candidate is accepted against a uniform companion draw of one operand.
//! - [`multiply_by_fraction`] / [`add_fraction`]: affine images of a cell are
//!   uniform but off the digit grid, see [`uniform_in_range`].

use log::debug;
use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use crate::bits::{uniform_below, BitSource};
use crate::error::{Error, Result};
use crate::psrn::{Psrn, Sign};
use crate::rational::Rational;

/// Samples `a + b`.
///
/// # Examples
///
/// ```
/// use exact_rand::arith::add;
/// use exact_rand::bits::RngBitSource;
/// use exact_rand::psrn::Psrn;
/// use exact_rand::rational::ratio;
///
/// let mut src = RngBitSource::from_seed(1);
/// let mut a = Psrn::new_uniform();
/// let mut b = Psrn::new_uniform();
/// let sum = add(&mut a, &mut b, &mut src).unwrap();
/// let (lo, hi) = sum.bounds();
/// assert!(lo >= ratio(0, 1).unwrap() && hi <= ratio(2, 1).unwrap());
/// ```
pub fn add<S: BitSource + ?Sized>(a: &mut Psrn, b: &mut Psrn, src: &mut S) -> Result<Psrn> {
    check_bases(a, b)?;
    let (na, nb, k) = aligned_cells(a, b, src);
    Ok(sum_of_cells(na + nb, k, a.base(), src))
}

/// Samples `a - b`.
pub fn subtract<S: BitSource + ?Sized>(a: &mut Psrn, b: &mut Psrn, src: &mut S) -> Result<Psrn> {
    check_bases(a, b)?;
    let (na, nb, k) = aligned_cells(a, b, src);
    // -b lies in the cell starting at -nb - 1.
    Ok(sum_of_cells(na - nb - 1, k, a.base(), src))
}

/// Samples `a * b`.
pub fn multiply<S: BitSource + ?Sized>(a: &mut Psrn, b: &mut Psrn, src: &mut S) -> Result<Psrn> {
    check_bases(a, b)?;
    let base = a.base();
    let sign = a.sign().times(b.sign());
    let (a0, a1) = magnitude_away_from_zero(a, src);
    let (b0, b1) = magnitude_away_from_zero(b, src);
    let lo = &a0 * &b0;
    let hi = &a1 * &b1;

    // With x uniform on [a0, a1), the product x*y is uniform on [x*b0, x*b1).
    // A candidate z uniform on [lo, hi) is kept when it falls in that range,
    // and then with probability a0/x to undo the bias toward wide ranges.
    loop {
        let mut z = uniform_in_range(&lo, &hi, base, src)?;
        let mut x = uniform_in_range(&a0, &a1, base, src)?;

        let inside = resolve(src, &mut [&mut z, &mut x], |bounds| {
            let (zl, zh) = &bounds[0];
            let (xl, xh) = &bounds[1];
            if *zh <= xl * &b0 || *zl >= xh * &b1 {
                Some(false)
            } else if *zl >= xh * &b0 && *zh <= xl * &b1 {
                Some(true)
            } else {
                None
            }
        });
        if !inside {
            debug!("multiply: candidate outside the product range");
            continue;
        }

        let mut w = Psrn::from_cell(&BigInt::zero(), 0, base);
        let keep = resolve(src, &mut [&mut w, &mut x], |bounds| {
            let (wl, wh) = &bounds[0];
            let (xl, xh) = &bounds[1];
            if wh * xh <= a0 {
                Some(true)
            } else if wl * xl >= a0 {
                Some(false)
            } else {
                None
            }
        });
        if !keep {
            debug!("multiply: candidate rejected by density correction");
            continue;
        }

        if sign == Sign::Negative {
            z.negate();
        }
        return Ok(z);
    }
}

/// Samples `a * r` for a non-zero rational `r`.
pub fn multiply_by_fraction<S: BitSource + ?Sized>(a: &mut Psrn, r: &Rational, src: &mut S) -> Result<Psrn> {
    if r.is_zero() {
        return Err(Error::invalid("cannot multiply a PSRN by zero"));
    }
    a.fill_gaps(src);
    let (lo, hi) = a.bounds();
    let (lo, hi) = if r.is_negative() {
        (hi * r, lo * r)
    } else {
        (lo * r, hi * r)
    };
    uniform_in_range(&lo, &hi, a.base(), src)
}

/// Samples `a + r` for a rational `r`.
pub fn add_fraction<S: BitSource + ?Sized>(a: &mut Psrn, r: &Rational, src: &mut S) -> Result<Psrn> {
    a.fill_gaps(src);
    let (lo, hi) = a.bounds();
    uniform_in_range(&(lo + r), &(hi + r), a.base(), src)
}

/// Samples a PSRN uniform on `[lo, hi)`.
///
/// The interval is covered by the smallest digit grid whose cells are no
/// wider than the interval; a uniformly chosen cell is kept when it lies
/// inside, and otherwise resolved against the endpoints digit by digit.
pub fn uniform_in_range<S: BitSource + ?Sized>(lo: &Rational, hi: &Rational, base: u32, src: &mut S) -> Result<Psrn> {
    if base < 2 {
        return Err(Error::invalid(format!("base {} must be at least 2", base)));
    }
    if lo >= hi {
        return Err(Error::invalid(format!("empty range [{}, {})", lo, hi)));
    }

    let width = hi - lo;
    let mut k = 0;
    let mut scale = BigInt::one();
    while &width * Rational::from_integer(scale.clone()) < Rational::one() {
        scale *= base;
        k += 1;
    }
    let scale_r = Rational::from_integer(scale.clone());
    let first = (lo * &scale_r).floor().to_integer();
    let last = (hi * &scale_r).ceil().to_integer();
    let count = (&last - &first).magnitude().clone();

    loop {
        let n = &first + BigInt::from(uniform_below(src, &count));
        let cell_lo = Rational::new(n.clone(), scale.clone());
        let cell_hi = Rational::new(&n + 1, scale.clone());
        let mut z = Psrn::from_cell(&n, k, base);
        if cell_lo >= *lo && cell_hi <= *hi {
            return Ok(z);
        }
        if z.less_than_rational(lo, src) || !z.less_than_rational(hi, src) {
            debug!("uniform_in_range: cell {} rejected", n);
            continue;
        }
        return Ok(z);
    }
}

fn check_bases(a: &Psrn, b: &Psrn) -> Result<()> {
    if a.base() != b.base() {
        return Err(Error::BaseMismatch {
            left: a.base(),
            right: b.base(),
        });
    }
    Ok(())
}

/// Closes the gaps of both operands and brings their prefixes to a common
/// length `k`, returning their cells at that level.
fn aligned_cells<S: BitSource + ?Sized>(a: &mut Psrn, b: &mut Psrn, src: &mut S) -> (BigInt, BigInt, usize) {
    let k = a.fill_gaps(src).max(b.fill_gaps(src));
    a.extend_to(src, k);
    b.extend_to(src, k);
    let (na, _) = a.cell();
    let (nb, _) = b.cell();
    (na, nb, k)
}

/// `(n + T) * base^-k` where `T = X + Y` for independent uniforms `X`, `Y`.
fn sum_of_cells<S: BitSource + ?Sized>(n: BigInt, k: usize, base: u32, src: &mut S) -> Psrn {
    let (carry, t) = sample_triangular(base, src);
    let (nt, j) = t.cell();
    let scale = BigInt::from(base).pow(j as u32);
    let cell = (n + u32::from(carry)) * scale + nt;
    Psrn::from_cell(&cell, k + j, base)
}

/// Samples `T` with density `t` on `[0, 1)` and `2 - t` on `[1, 2)`.
///
/// Returns the integer part of `T` and its fractional part as a PSRN.
fn sample_triangular<S: BitSource + ?Sized>(base: u32, src: &mut S) -> (bool, Psrn) {
    loop {
        let upper = src.randbit();
        let mut v = Psrn::from_cell(&BigInt::zero(), 0, base);
        let mut w = Psrn::from_cell(&BigInt::zero(), 0, base);
        // Accept v with probability v. In the upper half the density of the
        // fractional part is 1 - v, so the accepted v is reflected.
        if w.less_than(&mut v, src) {
            if upper {
                v.complement_fraction();
            }
            return (upper, v);
        }
    }
}

/// Moves the operand away from zero until its magnitude cell excludes zero,
/// and returns the bounds of that cell.
fn magnitude_away_from_zero<S: BitSource + ?Sized>(p: &mut Psrn, src: &mut S) -> (Rational, Rational) {
    p.fill_gaps(src);
    loop {
        let (lo, hi) = p.magnitude_bounds();
        if lo.is_positive() {
            return (lo, hi);
        }
        p.refine(src);
    }
}

/// Refines every operand by one digit until `test` decides on their bounds.
fn resolve<S, F>(src: &mut S, operands: &mut [&mut Psrn], mut test: F) -> bool
where
    S: BitSource + ?Sized,
    F: FnMut(&[(Rational, Rational)]) -> Option<bool>,
{
    loop {
        let bounds: Vec<_> = operands.iter().map(|p| p.bounds()).collect();
        if let Some(answer) = test(&bounds) {
            return answer;
        }
        for p in operands.iter_mut() {
            p.refine(src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use num_bigint::BigUint;

    use crate::bits::RngBitSource;
    use crate::psrn::Digit;
    use crate::rational::ratio;

    fn psrn(sign: Sign, integer: u32, digits: &[u32]) -> Psrn {
        let digits = digits.iter().map(|&d| Digit::Sampled(d)).collect();
        Psrn::from_parts(sign, BigUint::from(integer), digits, 2).unwrap()
    }

    fn hull(values: [Rational; 4]) -> (Rational, Rational) {
        let lo = values.iter().min().unwrap().clone();
        let hi = values.iter().max().unwrap().clone();
        (lo, hi)
    }

    #[test]
    fn test_add_stays_within_operand_bounds() {
        let mut src = RngBitSource::from_seed(41);
        for _ in 0..300 {
            let mut a = psrn(Sign::Positive, 1, &[0, 1]);
            let mut b = psrn(Sign::Negative, 0, &[1]);
            let (alo, ahi) = a.bounds();
            let (blo, bhi) = b.bounds();
            let sum = add(&mut a, &mut b, &mut src).unwrap();
            let (slo, shi) = sum.bounds();
            assert!(slo >= &alo + &blo, "{} < {}", slo, &alo + &blo);
            assert!(shi <= &ahi + &bhi, "{} > {}", shi, &ahi + &bhi);
            let v = sum.fill(&mut src, 20);
            assert!(v >= &alo + &blo && v <= &ahi + &bhi);
        }
    }

    #[test]
    fn test_add_mean() {
        let mut src = RngBitSource::from_seed(42);
        let n = 4_000;
        let mut total = 0.0;
        for _ in 0..n {
            let mut a = Psrn::new_uniform();
            let mut b = Psrn::new_uniform();
            total += add(&mut a, &mut b, &mut src).unwrap().fill_f64(&mut src);
        }
        // sd of the mean: sqrt(1/6 / 4000) ~ 0.0065
        let mean = total / n as f64;
        assert!((mean - 1.0).abs() < 0.035, "mean = {}", mean);
    }

    #[test]
    fn test_add_is_triangular() {
        let mut src = RngBitSource::from_seed(43);
        let n = 8_000;
        let mut below_half = 0;
        for _ in 0..n {
            let mut a = Psrn::new_uniform();
            let mut b = Psrn::new_uniform();
            let mut s = add(&mut a, &mut b, &mut src).unwrap();
            if s.less_than_rational(&ratio(1, 2).unwrap(), &mut src) {
                below_half += 1;
            }
        }
        // P(X + Y < 1/2) = 1/8: mean 1000, sd ~ 30
        assert!((850..=1_150).contains(&below_half), "below_half = {}", below_half);
    }

    #[test]
    fn test_subtract_is_symmetric() {
        let mut src = RngBitSource::from_seed(44);
        let n = 8_000;
        let mut negative = 0;
        for _ in 0..n {
            let mut a = Psrn::new_uniform();
            let mut b = Psrn::new_uniform();
            let d = subtract(&mut a, &mut b, &mut src).unwrap();
            let (lo, hi) = d.bounds();
            assert!(lo >= ratio(-1, 1).unwrap() && hi <= ratio(1, 1).unwrap());
            if d.sign() == Sign::Negative {
                negative += 1;
            }
        }
        // mean 4000, sd ~ 45
        assert!((3_750..=4_250).contains(&negative), "negative = {}", negative);
    }

    #[test]
    fn test_multiply_stays_within_operand_bounds() {
        let mut src = RngBitSource::from_seed(45);
        for _ in 0..200 {
            let mut a = psrn(Sign::Positive, 1, &[1]);
            let mut b = psrn(Sign::Negative, 0, &[0, 1]);
            let (alo, ahi) = a.bounds();
            let (blo, bhi) = b.bounds();
            let (lo, hi) = hull([&alo * &blo, &alo * &bhi, &ahi * &blo, &ahi * &bhi]);
            let product = multiply(&mut a, &mut b, &mut src).unwrap();
            assert_eq!(product.sign(), Sign::Negative);
            let v = product.fill(&mut src, 24);
            assert!(v >= lo && v <= hi, "{} not in [{}, {}]", v, lo, hi);
        }
    }

    #[test]
    fn test_multiply_mean() {
        let mut src = RngBitSource::from_seed(46);
        let n = 3_000;
        let mut below_quarter = 0;
        for _ in 0..n {
            let mut a = Psrn::new_uniform();
            let mut b = Psrn::new_uniform();
            let mut p = multiply(&mut a, &mut b, &mut src).unwrap();
            if p.less_than_rational(&ratio(1, 4).unwrap(), &mut src) {
                below_quarter += 1;
            }
        }
        // P(XY < 1/4) = 1/4 (1 + ln 4) ~ 0.5966: mean 1790, sd ~ 27
        assert!((1_650..=1_930).contains(&below_quarter), "below_quarter = {}", below_quarter);
    }

    #[test]
    fn test_multiply_by_fraction() {
        let mut src = RngBitSource::from_seed(47);
        let r = ratio(-3, 7).unwrap();
        for _ in 0..200 {
            let mut a = psrn(Sign::Positive, 0, &[1, 1]);
            let (lo, hi) = a.bounds();
            let scaled = multiply_by_fraction(&mut a, &r, &mut src).unwrap();
            let (zl, zh) = scaled.bounds();
            assert!(zl >= &hi * &r && zh <= &lo * &r, "[{}, {}]", zl, zh);
        }
        let mut a = Psrn::new_uniform();
        assert!(multiply_by_fraction(&mut a, &ratio(0, 1).unwrap(), &mut src).is_err());
    }

    #[test]
    fn test_add_fraction() {
        let mut src = RngBitSource::from_seed(48);
        let r = ratio(1, 3).unwrap();
        let n = 6_000;
        let mut below_one = 0;
        for _ in 0..n {
            let mut a = Psrn::new_uniform();
            let mut s = add_fraction(&mut a, &r, &mut src).unwrap();
            let (lo, hi) = s.bounds();
            assert!(lo >= r && hi <= ratio(4, 3).unwrap());
            if s.less_than_rational(&ratio(1, 1).unwrap(), &mut src) {
                below_one += 1;
            }
        }
        // P(U + 1/3 < 1) = 2/3: mean 4000, sd ~ 37
        assert!((3_800..=4_200).contains(&below_one), "below_one = {}", below_one);
    }

    #[test]
    fn test_uniform_in_range_straddling_zero() {
        let mut src = RngBitSource::from_seed(49);
        let lo = ratio(-1, 3).unwrap();
        let hi = ratio(2, 3).unwrap();
        let n = 6_000;
        let mut negative = 0;
        for _ in 0..n {
            let z = uniform_in_range(&lo, &hi, 2, &mut src).unwrap();
            let (zl, zh) = z.bounds();
            assert!(zl >= lo && zh <= hi);
            if z.sign() == Sign::Negative {
                negative += 1;
            }
        }
        // mean 2000, sd ~ 37
        assert!((1_800..=2_200).contains(&negative), "negative = {}", negative);
    }

    #[test]
    fn test_uniform_in_range_rejects_empty() {
        let mut src = RngBitSource::from_seed(50);
        let x = ratio(1, 2).unwrap();
        assert!(uniform_in_range(&x, &x, 2, &mut src).is_err());
    }

    #[test]
    fn test_base_mismatch() {
        let mut src = RngBitSource::from_seed(51);
        let mut a = Psrn::new_uniform();
        let mut b = Psrn::with_base(10).unwrap();
        assert!(matches!(add(&mut a, &mut b, &mut src), Err(Error::BaseMismatch { .. })));
        assert!(matches!(multiply(&mut a, &mut b, &mut src), Err(Error::BaseMismatch { .. })));
    }

    #[test]
    fn test_decimal_add() {
        let mut src = RngBitSource::from_seed(52);
        let mut a = Psrn::with_base(10).unwrap();
        let mut b = Psrn::with_base(10).unwrap();
        let sum = add(&mut a, &mut b, &mut src).unwrap();
        assert_eq!(sum.base(), 10);
        let v = sum.fill(&mut src, 5);
        assert!(v >= ratio(0, 1).unwrap() && v < ratio(2, 1).unwrap());
    }
}
