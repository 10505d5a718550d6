#![forbid(unsafe_code)]

//! Per-subscriber flow control.
//!
//! A stream observer states how many more values it is willing to accept.
//! The stream keeps the outstanding demand for each subscriber, consumes one
//! unit per delivered value, and adds whatever the observer returns from each
//! delivery. A subscriber whose demand reaches zero is skipped until more is
//! requested through its subscription handle.

use std::fmt;
use std::ops::Add;

/// Number of values an observer is willing to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Demand {
    /// No limit.
    #[default]
    Unlimited,
    /// At most this many more values.
    Max(usize),
}

impl Demand {
    /// No additional values.
    pub const NONE: Demand = Demand::Max(0);

    /// Whether the demand places no limit.
    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        matches!(self, Demand::Unlimited)
    }

    /// Whether no further values may be delivered.
    #[must_use]
    pub const fn is_exhausted(self) -> bool {
        matches!(self, Demand::Max(0))
    }

    /// Demand left after one value is delivered.
    #[must_use]
    pub const fn consume_one(self) -> Demand {
        match self {
            Demand::Unlimited => Demand::Unlimited,
            Demand::Max(n) => Demand::Max(n.saturating_sub(1)),
        }
    }
}

impl Add for Demand {
    type Output = Demand;

    fn add(self, rhs: Demand) -> Demand {
        match (self, rhs) {
            (Demand::Max(a), Demand::Max(b)) => Demand::Max(a.saturating_add(b)),
            _ => Demand::Unlimited,
        }
    }
}

impl fmt::Display for Demand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Demand::Unlimited => f.write_str("unlimited"),
            Demand::Max(n) => write!(f, "max({n})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unlimited_absorbs() {
        assert_eq!(Demand::Unlimited + Demand::Max(3), Demand::Unlimited);
        assert_eq!(Demand::Max(3) + Demand::Unlimited, Demand::Unlimited);
        assert_eq!(Demand::Unlimited.consume_one(), Demand::Unlimited);
    }

    #[test]
    fn max_counts_down_to_none() {
        let d = Demand::Max(2).consume_one().consume_one();
        assert_eq!(d, Demand::NONE);
        assert!(d.is_exhausted());
        assert_eq!(d.consume_one(), Demand::NONE);
    }

    #[test]
    fn display() {
        assert_eq!(Demand::Unlimited.to_string(), "unlimited");
        assert_eq!(Demand::Max(4).to_string(), "max(4)");
    }

    proptest! {
        #[test]
        fn add_saturates(a in any::<usize>(), b in any::<usize>()) {
            prop_assert_eq!(Demand::Max(a) + Demand::Max(b), Demand::Max(a.saturating_add(b)));
        }

        #[test]
        fn add_is_commutative(a in 0usize..1000, b in 0usize..1000, unlimited in any::<bool>()) {
            let lhs = if unlimited { Demand::Unlimited } else { Demand::Max(a) };
            let rhs = Demand::Max(b);
            prop_assert_eq!(lhs + rhs, rhs + lhs);
        }
    }
}
