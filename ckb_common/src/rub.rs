use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::op;

pub const FIAT_CURRENCY_CODE: &str = "RUB";
pub const FIAT_SYMBOL: &str = "₽";

//--------------------------------------       Rub       -------------------------------------------------------------
/// An amount of Russian rubles. Stored as a plain floating value, matching the REAL columns in the store.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Rub(f64);

op!(binary Rub, Add, add);
op!(binary Rub, Sub, sub);
op!(inplace Rub, SubAssign, sub_assign);
op!(unary Rub, Neg, neg);

impl Mul<f64> for Rub {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Rub {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl From<f64> for Rub {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Display for Rub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} {FIAT_SYMBOL}", self.0)
    }
}

impl Rub {
    pub fn value(&self) -> f64 {
        self.0
    }

    /// `pct` percent of this amount, e.g. `Rub::from(1000.0).percent(2.5)` is 25 ₽.
    pub fn percent(&self, pct: f64) -> Rub {
        Self(self.0 * pct / 100.0)
    }
}
