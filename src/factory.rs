//! Bernoulli factories for rational transforms of an unknown bias.
//!
//! Each factory is a [`Coin`] adapter: its constructor validates the
//! parameters (so malformed input fails before a single bit is drawn), and
//! [`Coin::flip`] runs the algorithm against the wrapped coin. The free
//! functions are one-shot shorthands over the adapters.
//!
//! | adapter         | bias                               |
//! |-----------------|------------------------------------|
//! | [`Logistic`]    | `c p / (1 + c p)`                  |
//! | [`Linear`]      | `c p`, for `c p <= 1 - eps`        |
//! | [`Power`]       | `p^a`, rational `a >= 0`           |
//! | [`DivOnePlus`]  | `1 / (1 + p)`                      |
//! | [`EvenParity`]  | `1 / (1 + p)`                      |
//! | [`TwoCoin`]     | `c1 p1 / (c1 p1 + c2 p2)`          |
//! | [`Bernstein`]   | polynomial in Bernstein form       |

use log::{debug, trace};
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::bits::BitSource;
use crate::coin::Coin;
use crate::error::{Error, Result};
use crate::rational::{check_probability, flip, ratio, Rational};

/// Validates `cx / cy` as a non-negative ratio with a positive denominator.
fn nonnegative_ratio(cx: BigInt, cy: BigInt, what: &str) -> Result<Rational> {
    if !cy.is_positive() {
        return Err(Error::invalid(format!("{}: denominator {} must be positive", what, cy)));
    }
    if cx.is_negative() {
        return Err(Error::invalid(format!("{}: numerator {} must be non-negative", what, cx)));
    }
    ratio(cx, cy)
}

/// One run of the logistic factory: `true` with probability `c p / (1 + c p)`,
/// where `reject = 1 / (1 + c)`.
fn logistic_step<C: Coin + ?Sized>(coin: &mut C, reject: &Rational, src: &mut dyn BitSource) -> bool {
    loop {
        if flip(src, reject) {
            return false;
        }
        if coin.flip(src) {
            return true;
        }
    }
}

/// `c p / (1 + c p)` for `c = cx / cy >= 0`.
pub struct Logistic<C> {
    coin: C,
    reject: Rational,
}

impl<C: Coin> Logistic<C> {
    pub fn new<N: Into<BigInt>, D: Into<BigInt>>(coin: C, cx: N, cy: D) -> Result<Self> {
        let c = nonnegative_ratio(cx.into(), cy.into(), "logistic")?;
        let reject = (Rational::one() + c).recip();
        Ok(Self { coin, reject })
    }
}

impl<C: Coin> Coin for Logistic<C> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        logistic_step(&mut self.coin, &self.reject, src)
    }
}

/// Walk counter of [`Linear`] for `c > 1`.
///
/// The walk moves down on a logistic success and up on a failure; reaching
/// zero accepts, which happens with probability `(c p)^walk`. At `limit` the
/// factor `(1 - eps/2)^walk` is split off with rational coins, leaving a walk
/// for the larger constant `c / (1 - eps/2)` and the halved slack `eps / 2`.
#[derive(Debug, Clone)]
struct LinearState {
    c: Rational,
    eps: Rational,
    walk: u64,
    limit: u64,
}

impl LinearState {
    fn new(c: Rational, eps: Rational) -> Self {
        let limit = layer_limit(&eps).max(2);
        Self {
            c,
            eps,
            walk: 1,
            limit,
        }
    }

    fn next_layer(&mut self) {
        let keep = Rational::one() - &self.eps / BigInt::from(2);
        self.c = &self.c / keep;
        self.eps = &self.eps / BigInt::from(2);
        self.limit = layer_limit(&self.eps).max(self.walk + 1);
    }
}

/// `ceil(23 / (5 eps))`: the walk length at which a layer gives up.
fn layer_limit(eps: &Rational) -> u64 {
    let m = (Rational::from_integer(BigInt::from(23)) / (eps * BigInt::from(5))).ceil();
    m.to_integer().to_u64().unwrap_or(u64::MAX)
}

/// `c p` for `c = cx / cy >= 0`, assuming `c p <= 1 - eps`.
///
/// For `c <= 1` this is a product of the coin with a rational coin. For
/// `c > 1` it is the random-walk construction of Huber (2014) with the
/// recursion flattened into [`LinearState`]. If the assumption `c p <= 1 - eps`
/// does not hold, the output is biased: it cannot be detected without knowing
/// `p`.
pub struct Linear<C> {
    coin: C,
    c: Rational,
    eps: Rational,
}

impl<C: Coin> Linear<C> {
    pub fn new<N: Into<BigInt>, D: Into<BigInt>>(coin: C, cx: N, cy: D) -> Result<Self> {
        Self::with_eps(coin, cx, cy, default_eps())
    }

    pub fn with_eps<N: Into<BigInt>, D: Into<BigInt>>(coin: C, cx: N, cy: D, eps: Rational) -> Result<Self> {
        let c = nonnegative_ratio(cx.into(), cy.into(), "linear")?;
        if !eps.is_positive() || eps >= Rational::one() {
            return Err(Error::invalid(format!("linear: eps = {} is not in (0, 1)", eps)));
        }
        Ok(Self { coin, c, eps })
    }
}

/// Slack used by [`Linear::new`]: `1/20`.
pub fn default_eps() -> Rational {
    Rational::new(BigInt::one(), BigInt::from(20))
}

impl<C: Coin> Coin for Linear<C> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        if self.c <= Rational::one() {
            return flip(src, &self.c) && self.coin.flip(src);
        }

        let mut state = LinearState::new(self.c.clone(), self.eps.clone());
        let mut reject = (Rational::one() + &state.c).recip();
        loop {
            if logistic_step(&mut self.coin, &reject, src) {
                state.walk -= 1;
                if state.walk == 0 {
                    return true;
                }
                continue;
            }
            state.walk += 1;
            if state.walk < state.limit {
                continue;
            }
            let keep = Rational::one() - &state.eps / BigInt::from(2);
            for _ in 0..state.walk {
                if !flip(src, &keep) {
                    trace!("linear: rejected at walk {}", state.walk);
                    return false;
                }
            }
            state.next_layer();
            reject = (Rational::one() + &state.c).recip();
            debug!(
                "linear: next layer c = {}, eps = {}, walk = {}, limit = {}",
                state.c, state.eps, state.walk, state.limit
            );
        }
    }
}

/// `p^a` for a rational exponent `a = ax / ay >= 0`.
///
/// The integer part of the exponent takes that many heads in a row; the
/// fractional part `0 < b < 1` uses the series
/// `1 - (1 - q)^b = sum_k (b/k) prod_{j<k} (1 - b/j) q^k` with `q = 1 - p`.
pub struct Power<C> {
    coin: C,
    whole: u64,
    fraction: Rational,
}

impl<C: Coin> Power<C> {
    pub fn new<N: Into<BigInt>, D: Into<BigInt>>(coin: C, ax: N, ay: D) -> Result<Self> {
        let a = nonnegative_ratio(ax.into(), ay.into(), "power")?;
        let whole = a
            .trunc()
            .to_integer()
            .to_u64()
            .ok_or_else(|| Error::invalid(format!("power: exponent {} is too large", a)))?;
        let fraction = a.fract();
        Ok(Self { coin, whole, fraction })
    }

    /// `sqrt(p)`.
    pub fn sqrt(coin: C) -> Self {
        Self {
            coin,
            whole: 0,
            fraction: Rational::new(BigInt::one(), BigInt::from(2)),
        }
    }
}

impl<C: Coin> Coin for Power<C> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        for _ in 0..self.whole {
            if !self.coin.flip(src) {
                return false;
            }
        }
        if self.fraction.is_zero() {
            return true;
        }
        let mut i = BigInt::one();
        loop {
            if self.coin.flip(src) {
                return true;
            }
            if flip(src, &(&self.fraction / &i)) {
                return false;
            }
            i += 1;
        }
    }
}

/// `1 / (1 + p)`, the complement of [`Logistic`] with `c = 1`.
///
/// Expected number of flips is bounded for every `p`; prefer it over
/// [`EvenParity`].
pub struct DivOnePlus<C> {
    coin: C,
    reject: Rational,
}

impl<C: Coin> DivOnePlus<C> {
    pub fn new(coin: C) -> Self {
        Self {
            coin,
            reject: Rational::new(BigInt::one(), BigInt::from(2)),
        }
    }
}

impl<C: Coin> Coin for DivOnePlus<C> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        !logistic_step(&mut self.coin, &self.reject, src)
    }
}

/// `1 / (1 + p)` as the parity of the heads seen before the first tail.
///
/// Uses `1 / (1 - p)` flips on average, unbounded as `p -> 1`.
pub struct EvenParity<C>(pub C);

impl<C: Coin> Coin for EvenParity<C> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        let mut even = true;
        while self.0.flip(src) {
            even = !even;
        }
        even
    }
}

/// `c1 p1 / (c1 p1 + c2 p2)` for two coins.
///
/// Never terminates if both coins always land `false`.
pub struct TwoCoin<A, B> {
    first: A,
    second: B,
    select: Rational,
}

impl<A: Coin, B: Coin> TwoCoin<A, B> {
    pub fn new(first: A, second: B, c1: &Rational, c2: &Rational) -> Result<Self> {
        if c1.is_negative() || c2.is_negative() {
            return Err(Error::invalid(format!("two_coin: weights {} and {} must be non-negative", c1, c2)));
        }
        if (c1 + c2).is_zero() {
            return Err(Error::invalid("two_coin: weights must not both be zero"));
        }
        let select = c1 / (c1 + c2);
        Ok(Self { first, second, select })
    }
}

impl<A: Coin, B: Coin> Coin for TwoCoin<A, B> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        loop {
            if flip(src, &self.select) {
                if self.first.flip(src) {
                    return true;
                }
            } else if self.second.flip(src) {
                return false;
            }
        }
    }
}

/// Polynomial `sum_j a_j C(n, j) p^j (1 - p)^(n - j)` with all `a_j` in
/// `[0, 1]` (Goyal and Sigman, 2012).
///
/// Flips the coin `n` times and then a rational coin of bias `a_heads`.
pub struct Bernstein<C> {
    coin: C,
    coefficients: Vec<Rational>,
}

impl<C: Coin> Bernstein<C> {
    pub fn new(coin: C, coefficients: Vec<Rational>) -> Result<Self> {
        if coefficients.is_empty() {
            return Err(Error::invalid("bernstein: at least one coefficient is required"));
        }
        for a in &coefficients {
            check_probability(a, "bernstein coefficient")?;
        }
        Ok(Self { coin, coefficients })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }
}

impl<C: Coin> Coin for Bernstein<C> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        let heads = (0..self.degree()).filter(|_| self.coin.flip(src)).count();
        flip(src, &self.coefficients[heads])
    }
}

/// Flips a [`Logistic`] coin once.
pub fn logistic<C, N, D>(f: &mut C, cx: N, cy: D, src: &mut dyn BitSource) -> Result<bool>
where
    C: Coin + ?Sized,
    N: Into<BigInt>,
    D: Into<BigInt>,
{
    Ok(Logistic::new(f, cx, cy)?.flip(src))
}

/// Flips a [`Linear`] coin once, with the default slack.
pub fn linear<C, N, D>(f: &mut C, cx: N, cy: D, src: &mut dyn BitSource) -> Result<bool>
where
    C: Coin + ?Sized,
    N: Into<BigInt>,
    D: Into<BigInt>,
{
    Ok(Linear::new(f, cx, cy)?.flip(src))
}

/// Flips a [`Linear`] coin once, with slack `eps`.
pub fn linear_eps<C, N, D>(f: &mut C, cx: N, cy: D, eps: Rational, src: &mut dyn BitSource) -> Result<bool>
where
    C: Coin + ?Sized,
    N: Into<BigInt>,
    D: Into<BigInt>,
{
    Ok(Linear::with_eps(f, cx, cy, eps)?.flip(src))
}

/// Flips a [`Power`] coin once.
pub fn power<C, N, D>(f: &mut C, ax: N, ay: D, src: &mut dyn BitSource) -> Result<bool>
where
    C: Coin + ?Sized,
    N: Into<BigInt>,
    D: Into<BigInt>,
{
    Ok(Power::new(f, ax, ay)?.flip(src))
}

/// `sqrt(p)`.
pub fn sqrt<C: Coin + ?Sized>(f: &mut C, src: &mut dyn BitSource) -> bool {
    Power::sqrt(f).flip(src)
}

/// `1 / (1 + p)`.
pub fn div_one_plus<C: Coin + ?Sized>(f: &mut C, src: &mut dyn BitSource) -> bool {
    DivOnePlus::new(f).flip(src)
}

/// `1 / (1 + p)` via [`EvenParity`].
pub fn even_parity<C: Coin + ?Sized>(f: &mut C, src: &mut dyn BitSource) -> bool {
    EvenParity(f).flip(src)
}

/// Flips a [`TwoCoin`] coin once.
pub fn two_coin<A, B>(f1: &mut A, f2: &mut B, c1: &Rational, c2: &Rational, src: &mut dyn BitSource) -> Result<bool>
where
    A: Coin + ?Sized,
    B: Coin + ?Sized,
{
    Ok(TwoCoin::new(f1, f2, c1, c2)?.flip(src))
}
