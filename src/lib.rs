//! # exact-rand: Exact Random Sampling in Rust
//!
//! **`exact-rand`** samples *exactly*: given nothing but a source of fair bits,
//! every algorithm here produces outcomes whose law is exactly the one asked
//! for, with no rounding and no floating point on any decision path.
//!
//! ## What is exact sampling?
//!
//! A floating-point sampler draws from a distribution that is merely *close*
//! to the target. An exact sampler reveals randomness one bit at a time and
//! makes each decision only once enough bits have been seen to make it with
//! certainty. Termination is then almost sure rather than bounded, and the
//! result carries no discretization error however long the draw runs.
//!
//! ## Key Features
//!
//! - **Rational coins**: [`zero_or_one`][crate::rational::zero_or_one] flips a coin of any rational bias with two bits on average.
//! - **Partially-sampled random numbers**: a [`Psrn`][crate::psrn::Psrn] is a uniform variate whose digits are sampled lazily and fixed forever; PSRNs can be compared, added and multiplied exactly ([`arith`]).
//! - **Bernoulli factories**: turn a coin of *unknown* bias `p` into a coin of bias `f(p)`, for algebraic ([`coin`]), rational ([`factory`]) and series ([`series`]) transforms of `p`.
//! - **General simulator**: any suitably bounded `f`, given an [`Oracle`][crate::simulate::Oracle] bounding its Bernstein coefficients ([`simulate`]).
//!
//! ## Basic Usage
//!
//! ```rust
//! use exact_rand::coin::Coin;
//! use exact_rand::factory::Logistic;
//! use exact_rand::rational::RationalCoin;
//! use exact_rand::sampler::Sampler;
//!
//! // 1. Create a seeded sampler
//! let mut sampler = Sampler::from_seed(42);
//!
//! // 2. A coin of bias 1/3, flipped exactly
//! let _heads = sampler.zero_or_one(1, 3).unwrap();
//!
//! // 3. Turn a fair coin into a coin of bias p / (1 + p) = 1/3
//! let mut coin = Logistic::new(RationalCoin::fair(), 1, 1).unwrap();
//! let _heads = sampler.flip(&mut coin);
//!
//! // 4. Compare two uniform variates, sampling only the digits needed
//! let mut x = sampler.new_psrn();
//! let mut y = sampler.new_psrn();
//! let _less = x.compare(&mut y, &mut sampler).unwrap().is_lt();
//! ```
//!
//! ## Core Components
//!
//! - **[`bits`]**: The [`BitSource`][crate::bits::BitSource] trait and its RNG-backed and counting implementations.
//! - **[`psrn`]** and **[`arith`]**: Partially-sampled random numbers and their arithmetic.
//! - **[`coin`]**, **[`factory`]**, **[`series`]**: Bernoulli factories.
//! - **[`simulate`]**: The general factory-function simulator.
//! - **[`sampler`]**: A seeded bit source bundled with its [`Config`][crate::config::Config].
//!
//! Nothing here is thread-safe by sharing: the order in which bits are drawn is
//! part of a draw's correctness, so use one bit source per thread.

pub mod arith;
pub mod bits;
pub mod cache;
pub mod coin;
pub mod config;
pub mod error;
pub mod factory;
pub mod psrn;
pub mod rational;
pub mod sampler;
pub mod series;
pub mod simulate;
pub mod utils;

#[cfg(test)]
mod testing;
