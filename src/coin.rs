//! Coins and the algebraic Bernoulli-factory combinators.
//!
//! A [`Coin`] is anything that can produce an outcome `true` with some fixed,
//! possibly unknown, probability. Coins compose by wrapping: each adapter owns
//! (or borrows, through the `&mut C` impl) its upstream coins and draws the
//! extra fair bits it needs from the bit source passed to [`Coin::flip`].
//!
//! ```
//! use exact_rand::bits::RngBitSource;
//! use exact_rand::coin::{Coin, CoinExt};
//! use exact_rand::rational::RationalCoin;
//!
//! let mut src = RngBitSource::from_seed(5);
//! let p = RationalCoin::from_ratio(1, 3).unwrap();
//! let q = RationalCoin::from_ratio(1, 2).unwrap();
//!
//! // 1 - (1/3)(1/2) = 5/6
//! let mut coin = p.and(q).complement();
//! let _heads = coin.flip(&mut src);
//! ```

use crate::bits::BitSource;
use crate::rational::RationalCoin;

/// A coin of fixed (possibly unknown) bias.
pub trait Coin {
    /// Flips the coin once.
    fn flip(&mut self, src: &mut dyn BitSource) -> bool;
}

impl<C: Coin + ?Sized> Coin for &mut C {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        (**self).flip(src)
    }
}

impl<C: Coin + ?Sized> Coin for Box<C> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        (**self).flip(src)
    }
}

impl Coin for RationalCoin {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        self.toss(src)
    }
}

/// Coin from a closure that draws its fair bits from the given source.
pub struct FnCoin<F>(pub F);

impl<F: FnMut(&mut dyn BitSource) -> bool> Coin for FnCoin<F> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        (self.0)(src)
    }
}

/// Coin backed by an external process with its own randomness.
///
/// The bit source is ignored: this is the "black box" of unknown bias that a
/// Bernoulli factory is fed.
pub struct BlackBox<F>(pub F);

impl<F: FnMut() -> bool> Coin for BlackBox<F> {
    fn flip(&mut self, _src: &mut dyn BitSource) -> bool {
        (self.0)()
    }
}

/// Coin that always lands the same way.
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub bool);

impl Coin for Constant {
    fn flip(&mut self, _src: &mut dyn BitSource) -> bool {
        self.0
    }
}

/// `1 - p`.
pub struct Complement<C>(pub C);

impl<C: Coin> Coin for Complement<C> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        !self.0.flip(src)
    }
}

/// `p * q`. The second coin is not flipped when the first lands `false`.
pub struct Product<A, B>(pub A, pub B);

impl<A: Coin, B: Coin> Coin for Product<A, B> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        self.0.flip(src) && self.1.flip(src)
    }
}

/// `p + q - p * q`. The second coin is not flipped when the first lands `true`.
pub struct Disjunction<A, B>(pub A, pub B);

impl<A: Coin, B: Coin> Coin for Disjunction<A, B> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        self.0.flip(src) || self.1.flip(src)
    }
}

/// `(p + q) / 2`: one fair bit picks which coin to flip.
pub struct Mean<A, B>(pub A, pub B);

impl<A: Coin, B: Coin> Coin for Mean<A, B> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        if src.randbit() {
            self.0.flip(src)
        } else {
            self.1.flip(src)
        }
    }
}

/// `s * p + (1 - s) * q`: the selector coin picks the branch.
pub struct Conditional<S, A, B> {
    pub selector: S,
    pub if_true: A,
    pub if_false: B,
}

impl<S: Coin, A: Coin, B: Coin> Coin for Conditional<S, A, B> {
    fn flip(&mut self, src: &mut dyn BitSource) -> bool {
        if self.selector.flip(src) {
            self.if_true.flip(src)
        } else {
            self.if_false.flip(src)
        }
    }
}

/// Combinator methods available on every coin.
pub trait CoinExt: Coin + Sized {
    fn complement(self) -> Complement<Self> {
        Complement(self)
    }

    fn and<B: Coin>(self, other: B) -> Product<Self, B> {
        Product(self, other)
    }

    fn or<B: Coin>(self, other: B) -> Disjunction<Self, B> {
        Disjunction(self, other)
    }

    fn mean<B: Coin>(self, other: B) -> Mean<Self, B> {
        Mean(self, other)
    }
}

impl<C: Coin> CoinExt for C {}

/// Counts heads over `trials` flips.
///
/// Convenience for estimating a bias in demos and tests.
pub fn count_heads<C: Coin + ?Sized>(coin: &mut C, src: &mut dyn BitSource, trials: usize) -> usize {
    (0..trials).filter(|_| coin.flip(src)).count()
}
