use std::{
    fmt::Display,
    ops::{Add, Sub},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::op;

//--------------------------------------   CryptoAmount   ------------------------------------------------------------
/// A quantity of cryptocurrency, displayed to 8 decimal places regardless of asset.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct CryptoAmount(f64);

op!(binary CryptoAmount, Add, add);
op!(binary CryptoAmount, Sub, sub);

impl From<f64> for CryptoAmount {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl Display for CryptoAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.8}", self.0)
    }
}

impl CryptoAmount {
    pub fn value(&self) -> f64 {
        self.0
    }
}
