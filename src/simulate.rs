//! General factory-function simulator.
//!
//! Given a coin of unknown bias `p` and an [`Oracle`] bounding the Bernstein
//! coefficients of a target function `f` from below and above at growing
//! degrees, [`Simulator::simulate`] returns `true` with probability exactly
//! `f(p)`. This is the reverse-time martingale construction of Łatuszyński,
//! Kosmidis, Papaspiliopoulos and Roberts (2011):
//!
//! - each round flips the coin up to the next degree `n` and reads the oracle
//!   bounds `fbelow(n, k)` and `fabove(n, k)` at the number of heads `k`;
//! - the previous round's bounds, degree-elevated and averaged over the ways
//!   the earlier heads can sit among the current ones, must be no tighter;
//! - the running bracket `[lt, ut]` is narrowed by reweighting, and a uniform
//!   PSRN decides once it falls outside the bracket.
//!
//! A violation of the monotone narrowing contract is reported as
//! [`Error::InternalConsistency`] instead of silently sampling a wrong law.

use std::cell::RefCell;

use log::debug;
use num_bigint::{BigInt, BigUint};
use num_traits::{One, Signed, Zero};

use crate::bits::BitSource;
use crate::cache::Cache;
use crate::coin::Coin;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::psrn::Psrn;
use crate::rational::{check_probability, Rational};
use crate::utils::binomial;

/// Bounds on the Bernstein coefficients of a target function.
///
/// Contract: for every degree `n` and heads count `k`, the true coefficient
/// lies in `[fbelow(n, k), fabove(n, k)]`, and those bounds only tighten as
/// `n` grows along [`next_degree`][Oracle::next_degree].
pub trait Oracle {
    /// Lower bound on the `k`-th coefficient of degree `n`.
    fn fbelow(&self, n: u64, k: u64) -> Rational;

    /// Upper bound on the `k`-th coefficient of degree `n`.
    fn fabove(&self, n: u64, k: u64) -> Rational;

    /// Range of all values `fbelow(n, _)` and `fabove(n, _)` may take.
    fn fbound(&self, _n: u64) -> (Rational, Rational) {
        (Rational::zero(), Rational::one())
    }

    /// Degree following `n`; must be strictly greater.
    fn next_degree(&self, n: u64) -> u64 {
        n.saturating_mul(2)
    }
}

impl<O: Oracle + ?Sized> Oracle for &O {
    fn fbelow(&self, n: u64, k: u64) -> Rational {
        (**self).fbelow(n, k)
    }

    fn fabove(&self, n: u64, k: u64) -> Rational {
        (**self).fabove(n, k)
    }

    fn fbound(&self, n: u64) -> (Rational, Rational) {
        (**self).fbound(n)
    }

    fn next_degree(&self, n: u64) -> u64 {
        (**self).next_degree(n)
    }
}

/// Oracle built from two closures.
pub struct FnOracle<B, A> {
    below: B,
    above: A,
}

impl<B, A> FnOracle<B, A>
where
    B: Fn(u64, u64) -> Rational,
    A: Fn(u64, u64) -> Rational,
{
    pub fn new(below: B, above: A) -> Self {
        Self { below, above }
    }
}

impl<B, A> Oracle for FnOracle<B, A>
where
    B: Fn(u64, u64) -> Rational,
    A: Fn(u64, u64) -> Rational,
{
    fn fbelow(&self, n: u64, k: u64) -> Rational {
        (self.below)(n, k)
    }

    fn fabove(&self, n: u64, k: u64) -> Rational {
        (self.above)(n, k)
    }
}

/// Exact oracle for a polynomial given in Bernstein form.
///
/// Below the polynomial's own degree nothing is known and the bounds are
/// `(0, 1)`; from there on the bounds coincide with the degree-elevated
/// coefficients, so the first round at or above the degree decides.
pub struct BernsteinPolynomial {
    coefficients: Vec<Rational>,
    elevated: RefCell<Cache<(u64, u64), Rational>>,
}

impl BernsteinPolynomial {
    pub fn new(coefficients: Vec<Rational>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(Error::invalid("polynomial needs at least one coefficient"));
        }
        for a in &coefficients {
            check_probability(a, "Bernstein coefficient")?;
        }
        Ok(Self {
            coefficients,
            elevated: RefCell::new(Cache::new(10)),
        })
    }

    pub fn degree(&self) -> u64 {
        (self.coefficients.len() - 1) as u64
    }

    /// The `k`-th coefficient after elevating to degree `n >= degree()`:
    /// `sum_j a_j C(d, j) C(n - d, k - j) / C(n, k)`.
    ///
    /// # Panics
    ///
    /// Panics if `n < degree()` or `k > n`.
    pub fn elevated(&self, n: u64, k: u64) -> Rational {
        assert!(n >= self.degree() && k <= n, "({}, {}) is not above degree {}", n, k, self.degree());
        self.elevated
            .borrow_mut()
            .get_or_insert_with((n, k), || {
                let d = self.degree();
                let lo = k.saturating_sub(n - d);
                let hi = k.min(d);
                let mut sum = Rational::zero();
                for j in lo..=hi {
                    let weight = binomial(d, j) * binomial(n - d, k - j);
                    sum += &self.coefficients[j as usize] * Rational::from_integer(BigInt::from(weight));
                }
                sum / Rational::from_integer(BigInt::from(binomial(n, k)))
            })
            .clone()
    }
}

impl Oracle for BernsteinPolynomial {
    fn fbelow(&self, n: u64, k: u64) -> Rational {
        if n < self.degree() {
            Rational::zero()
        } else {
            self.elevated(n, k)
        }
    }

    fn fabove(&self, n: u64, k: u64) -> Rational {
        if n < self.degree() {
            Rational::one()
        } else {
            self.elevated(n, k)
        }
    }

    fn next_degree(&self, n: u64) -> u64 {
        if n < self.degree() {
            self.degree()
        } else {
            n.saturating_mul(2)
        }
    }
}

/// Runs the general factory-function algorithm for one oracle.
///
/// The simulator owns its memo tables (binomial coefficients and oracle
/// bounds), so repeated draws for the same target reuse earlier work.
pub struct Simulator<O> {
    oracle: O,
    first_degree: u64,
    binomials: Cache<(u64, u64), BigUint>,
    bounds: Cache<(u64, u64), (Rational, Rational)>,
}

impl<O: Oracle> Simulator<O> {
    pub fn new(oracle: O) -> Self {
        Self::build(oracle, &Config::default())
    }

    pub fn with_config(oracle: O, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(oracle, config))
    }

    fn build(oracle: O, config: &Config) -> Self {
        Self {
            oracle,
            first_degree: config.first_degree,
            binomials: Cache::new(config.memo_bits),
            bounds: Cache::new(config.memo_bits),
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Hits and misses of the memo tables so far.
    pub fn memo_stats(&self) -> (usize, usize) {
        (
            self.binomials.hits() + self.bounds.hits(),
            self.binomials.misses() + self.bounds.misses(),
        )
    }

    fn binomial(&mut self, n: u64, k: u64) -> BigUint {
        self.binomials.get_or_insert_with((n, k), || binomial(n, k)).clone()
    }

    /// Oracle bounds at `(n, k)`, validated against `fbound(n)` and `[0, 1]`.
    fn bounds(&mut self, n: u64, k: u64) -> Result<(Rational, Rational)> {
        if let Some(cached) = self.bounds.get(&(n, k)) {
            return Ok(cached.clone());
        }
        let lo = self.oracle.fbelow(n, k);
        let hi = self.oracle.fabove(n, k);
        let (bl, bu) = self.oracle.fbound(n);
        if lo < bl || hi > bu || lo.is_negative() || hi > Rational::one() {
            return Err(Error::inconsistent(format!(
                "bounds [{}, {}] at ({}, {}) escape [{}, {}] or [0, 1]",
                lo, hi, n, k, bl, bu
            )));
        }
        if lo > hi {
            return Err(Error::inconsistent(format!(
                "fbelow({}, {}) = {} exceeds fabove = {}",
                n, k, lo, hi
            )));
        }
        self.bounds.insert((n, k), (lo.clone(), hi.clone()));
        Ok((lo, hi))
    }

    /// Bounds of degree `m` elevated to degree `n` at `k` heads: the average
    /// over the `j` heads among the first `m` flips, weighted by
    /// `C(m, j) C(n - m, k - j) / C(n, k)`.
    fn elevated_bounds(&mut self, m: u64, n: u64, k: u64) -> Result<(Rational, Rational)> {
        let lo_j = k.saturating_sub(n - m);
        let hi_j = k.min(m);
        let mut below = Rational::zero();
        let mut above = Rational::zero();
        for j in lo_j..=hi_j {
            let weight = self.binomial(m, j) * self.binomial(n - m, k - j);
            let weight = Rational::from_integer(BigInt::from(weight));
            let (lo, hi) = self.bounds(m, j)?;
            below += lo * &weight;
            above += hi * weight;
        }
        let total = Rational::from_integer(BigInt::from(self.binomial(n, k)));
        Ok((below / &total, above / total))
    }

    /// Returns `true` with probability `f(p)`, where `p` is the bias of `coin`.
    pub fn simulate<C: Coin + ?Sized>(&mut self, coin: &mut C, src: &mut dyn BitSource) -> Result<bool> {
        let mut lt = Rational::zero();
        let mut ut = Rational::one();
        let mut u = Psrn::new_uniform();
        let mut n = self.first_degree;
        let mut last = 0u64;
        let mut ones = 0u64;

        loop {
            for _ in last..n {
                if coin.flip(src) {
                    ones += 1;
                }
            }

            let (lo, hi) = self.bounds(n, ones)?;
            let (ls, us) = if last == 0 {
                (Rational::zero(), Rational::one())
            } else {
                self.elevated_bounds(last, n, ones)?
            };
            if lo < ls || hi > us {
                return Err(Error::inconsistent(format!(
                    "bounds [{}, {}] at ({}, {}) are looser than the elevated [{}, {}] of degree {}",
                    lo, hi, n, ones, ls, us, last
                )));
            }
            let gap = &us - &ls;
            if gap.is_zero() {
                return Err(Error::inconsistent(format!(
                    "elevated bounds collapsed to {} at ({}, {})",
                    ls, n, ones
                )));
            }

            let width = &ut - &lt;
            let new_lt = &lt + (&lo - &ls) * &width / &gap;
            let new_ut = &ut - (&us - &hi) * &width / &gap;
            lt = new_lt;
            ut = new_ut;
            debug!("simulate: degree {}, heads {}, bracket [{}, {}]", n, ones, lt, ut);

            if u.less_than_rational(&lt, src) {
                return Ok(true);
            }
            if !u.less_than_rational(&ut, src) {
                return Ok(false);
            }

            let next = self.oracle.next_degree(n);
            if next <= n {
                return Err(Error::inconsistent(format!(
                    "degree schedule is not increasing: {} after {}",
                    next, n
                )));
            }
            last = n;
            n = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::bits::RngBitSource;
    use crate::coin::{Constant, FnCoin};
    use crate::rational::RationalCoin;
    use crate::testing::assert_near;

    fn coin(num: i64, den: i64) -> RationalCoin {
        RationalCoin::from_ratio(num, den).unwrap()
    }

    fn r(num: u64, den: u64) -> Rational {
        Rational::new(BigInt::from(num), BigInt::from(den))
    }

    /// `f(x) = x / (1 + x)` with upper slack `1/(2n)`.
    fn concave() -> FnOracle<impl Fn(u64, u64) -> Rational, impl Fn(u64, u64) -> Rational> {
        FnOracle::new(|n, k| r(k, n + k), |n, k| r(k, n + k) + r(1, 2 * n))
    }

    #[test]
    fn test_identity_oracle() {
        let mut src = RngBitSource::from_seed(1);
        let mut sim = Simulator::new(FnOracle::new(|n, k| r(k, n), |n, k| r(k, n)));
        let n = 40_000;
        for (num, den) in [(1, 3), (3, 4)] {
            let mut f = coin(num, den);
            let heads = (0..n).filter(|_| sim.simulate(&mut f, &mut src).unwrap()).count();
            assert_near(heads, n, num as f64 / den as f64);
        }
    }

    #[test]
    fn test_identity_oracle_is_the_coin() {
        // With exact bounds the first round decides, and the answer is the flip.
        let mut src = RngBitSource::from_seed(2);
        let mut sim = Simulator::new(FnOracle::new(|n, k| r(k, n), |n, k| r(k, n)));
        assert!(sim.simulate(&mut Constant(true), &mut src).unwrap());
        assert!(!sim.simulate(&mut Constant(false), &mut src).unwrap());
    }

    #[test]
    fn test_concave_oracle() {
        let mut src = RngBitSource::from_seed(3);
        let mut sim = Simulator::new(concave());
        let mut f = coin(1, 2);
        let n = 4_000;
        let heads = (0..n).filter(|_| sim.simulate(&mut f, &mut src).unwrap()).count();
        assert_near(heads, n, 1.0 / 3.0);
        let (hits, _) = sim.memo_stats();
        assert!(hits > 0);
    }

    #[test]
    fn test_bernstein_polynomial() {
        // 2p(1 - p) + p^2 = 2p - p^2, which is 3/4 at p = 1/2.
        let poly = BernsteinPolynomial::new(vec![r(0, 1), r(1, 1), r(1, 1)]).unwrap();
        assert_eq!(poly.degree(), 2);
        assert_eq!(poly.elevated(3, 1), r(2, 3));
        assert_eq!(poly.next_degree(1), 2);

        let mut src = RngBitSource::from_seed(4);
        let mut sim = Simulator::new(&poly);
        let mut f = coin(1, 2);
        let n = 40_000;
        let heads = (0..n).filter(|_| sim.simulate(&mut f, &mut src).unwrap()).count();
        assert_near(heads, n, 0.75);

        assert!(BernsteinPolynomial::new(vec![]).is_err());
        assert!(BernsteinPolynomial::new(vec![r(3, 2)]).is_err());
    }

    #[test]
    fn test_inconsistent_oracle() {
        // Round one claims [1/4, 3/4], round two falls back to [0, 1].
        let oracle = FnOracle::new(
            |n, _| if n == 1 { r(1, 4) } else { r(0, 1) },
            |n, _| if n == 1 { r(3, 4) } else { r(1, 1) },
        );
        let mut src = RngBitSource::from_seed(5);
        let mut sim = Simulator::new(oracle);
        let mut f = coin(1, 2);
        let errors = (0..64)
            .filter(|_| matches!(sim.simulate(&mut f, &mut src), Err(Error::InternalConsistency(_))))
            .count();
        assert!(errors > 0);
    }

    #[test]
    fn test_crossed_bounds() {
        let mut src = RngBitSource::from_seed(6);
        let mut sim = Simulator::new(FnOracle::new(|_, _| r(3, 4), |_, _| r(1, 4)));
        let result = sim.simulate(&mut coin(1, 2), &mut src);
        assert!(matches!(result, Err(Error::InternalConsistency(_))));
    }

    #[test]
    fn test_out_of_range_bounds() {
        let mut src = RngBitSource::from_seed(7);
        let mut sim = Simulator::new(FnOracle::new(|_, _| r(0, 1), |_, _| r(3, 2)));
        assert!(sim.simulate(&mut coin(1, 2), &mut src).is_err());
    }

    /// Oracle for `f(p) = 1/4 + p/2`, which stays within `[1/4, 3/4]`.
    struct Narrow {
        loose_below: bool,
    }

    impl Narrow {
        fn exact(n: u64, k: u64) -> Rational {
            r(1, 4) + r(k, 2 * n)
        }
    }

    impl Oracle for Narrow {
        fn fbelow(&self, n: u64, k: u64) -> Rational {
            if self.loose_below {
                r(1, 8)
            } else {
                Self::exact(n, k)
            }
        }

        fn fabove(&self, n: u64, k: u64) -> Rational {
            Self::exact(n, k)
        }

        fn fbound(&self, _n: u64) -> (Rational, Rational) {
            (r(1, 4), r(3, 4))
        }
    }

    #[test]
    fn test_bounds_outside_fbound() {
        let mut src = RngBitSource::from_seed(7);
        // 1/8 is inside [0, 1] but below the oracle's own range.
        let mut sim = Simulator::new(Narrow { loose_below: true });
        let result = sim.simulate(&mut coin(1, 2), &mut src);
        assert!(matches!(result, Err(Error::InternalConsistency(_))));

        let mut sim = Simulator::new(Narrow { loose_below: false });
        let n = 20_000;
        let heads = (0..n).filter(|_| sim.simulate(&mut coin(1, 2), &mut src).unwrap()).count();
        assert_near(heads, n, 0.5);
    }

    struct Stuck;

    impl Oracle for Stuck {
        fn fbelow(&self, _n: u64, _k: u64) -> Rational {
            Rational::zero()
        }

        fn fabove(&self, _n: u64, _k: u64) -> Rational {
            Rational::one()
        }

        fn next_degree(&self, n: u64) -> u64 {
            n
        }
    }

    #[test]
    fn test_degree_schedule_must_increase() {
        let mut src = RngBitSource::from_seed(8);
        let mut sim = Simulator::new(Stuck);
        let result = sim.simulate(&mut Constant(true), &mut src);
        assert!(matches!(result, Err(Error::InternalConsistency(_))));
    }

    #[test]
    fn test_first_degree_from_config() {
        let config = Config {
            first_degree: 4,
            ..Config::default()
        };
        let mut src = RngBitSource::from_seed(9);
        let mut sim = Simulator::with_config(FnOracle::new(|n, k| r(k, n), |n, k| r(k, n)), &config).unwrap();
        let mut flips = 0;
        let mut f = FnCoin(|src: &mut dyn BitSource| {
            flips += 1;
            src.randbit()
        });
        sim.simulate(&mut f, &mut src).unwrap();
        drop(f);
        // Exact bounds decide in the first round, after four flips.
        assert_eq!(flips, 4);
    }

    #[test]
    fn test_with_config_rejects_bad_config() {
        let identity = || FnOracle::new(|n, k| r(k, n), |n, k| r(k, n));
        let too_big = Config {
            memo_bits: 32,
            ..Config::default()
        };
        assert!(matches!(
            Simulator::with_config(identity(), &too_big),
            Err(Error::InvalidArgument(_))
        ));
        let zero_degree = Config {
            first_degree: 0,
            ..Config::default()
        };
        assert!(matches!(
            Simulator::with_config(identity(), &zero_degree),
            Err(Error::InvalidArgument(_))
        ));
    }
}
