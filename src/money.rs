//! Integer money arithmetic in cents.
//!
//! Every budget amount in the crate is a whole number of cents, the smallest
//! billing unit. Percent and ratio scaling round down, so repeated splits can
//! only under-distribute, never create money.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// An amount of money in whole cents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(pub u64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    /// Construct from whole dollars.
    pub fn from_dollars(dollars: u64) -> Self {
        Cents(dollars * 100)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, other: Cents) -> Cents {
        Cents(self.0.saturating_sub(other.0))
    }

    pub fn checked_add(self, other: Cents) -> Option<Cents> {
        self.0.checked_add(other.0).map(Cents)
    }

    /// Scale by an integer percentage, rounding down to the cent.
    pub fn percent_floor(self, percent: u8) -> Cents {
        Cents((u128::from(self.0) * u128::from(percent) / 100) as u64)
    }

    /// Scale by `numerator / denominator`, rounding down to the cent.
    /// A zero denominator yields zero.
    pub fn ratio_floor(self, numerator: u64, denominator: u64) -> Cents {
        if denominator == 0 {
            return Cents::ZERO;
        }
        Cents((u128::from(self.0) * u128::from(numerator) / u128::from(denominator)) as u64)
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Cents {
        iter.fold(Cents::ZERO, |acc, c| acc + c)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}
