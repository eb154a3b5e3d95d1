use std::fmt::{self, Debug, Display};

/// Multiplicity attached to every traverser.
///
/// `sum` is used when two equal traversers are bulked together and must be
/// associative and commutative. `multiply` folds an instruction's coefficient
/// into a traverser as it passes that instruction.
pub trait Coefficient: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// The multiplicative identity.
    fn one() -> Self;

    /// Resets this coefficient to the multiplicative identity.
    fn unity(&mut self);

    fn is_unity(&self) -> bool;

    fn multiply(&mut self, other: &Self);

    fn sum(&mut self, other: &Self);

    /// Number of times the carried object is observed by a consumer.
    fn count(&self) -> u64;
}

/// The default coefficient: a plain 64-bit bulk count.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LongCoefficient(u64);

impl LongCoefficient {
    pub const fn new(count: u64) -> Self {
        Self(count)
    }
}

impl Default for LongCoefficient {
    fn default() -> Self {
        Self::one()
    }
}

impl Coefficient for LongCoefficient {
    #[inline]
    fn one() -> Self {
        Self(1)
    }

    #[inline]
    fn unity(&mut self) {
        self.0 = 1;
    }

    #[inline]
    fn is_unity(&self) -> bool {
        self.0 == 1
    }

    #[inline]
    fn multiply(&mut self, other: &Self) {
        self.0 = self.0.saturating_mul(other.0);
    }

    #[inline]
    fn sum(&mut self, other: &Self) {
        self.0 = self.0.saturating_add(other.0);
    }

    #[inline]
    fn count(&self) -> u64 {
        self.0
    }
}

impl From<u64> for LongCoefficient {
    fn from(count: u64) -> Self {
        Self(count)
    }
}

impl Debug for LongCoefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl Display for LongCoefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unity_resets() {
        let mut c = LongCoefficient::new(7);
        assert!(!c.is_unity());
        c.unity();
        assert!(c.is_unity());
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn test_clone_is_independent() {
        let a = LongCoefficient::new(3);
        let mut b = a;
        b.multiply(&LongCoefficient::new(4));
        assert_eq!(a.count(), 3);
        assert_eq!(b.count(), 12);
    }

    proptest! {
        #[test]
        fn test_sum_is_associative_and_commutative(a in 0u64..1_000, b in 0u64..1_000, c in 0u64..1_000) {
            let (a, b, c) = (LongCoefficient::new(a), LongCoefficient::new(b), LongCoefficient::new(c));

            let mut left = a;
            left.sum(&b);
            left.sum(&c);

            let mut right = b;
            right.sum(&c);
            let mut right_total = a;
            right_total.sum(&right);

            let mut swapped = b;
            swapped.sum(&a);
            let mut ab = a;
            ab.sum(&b);

            prop_assert_eq!(left, right_total);
            prop_assert_eq!(swapped, ab);
        }
    }
}
