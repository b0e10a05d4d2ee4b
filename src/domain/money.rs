use crate::error::SettleError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A positive monetary amount.
///
/// Wrapper around `rust_decimal::Decimal` so that bill totals and obligation
/// dues can never be zero or negative once constructed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, SettleError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(SettleError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Divides this amount evenly across `n` shares, rounded to 2 decimal
    /// places. The remainder is not redistributed.
    pub fn split_evenly(&self, n: usize) -> Result<Self, SettleError> {
        if n == 0 {
            return Err(SettleError::Validation(
                "Cannot split among zero members".to_string(),
            ));
        }
        Self::new((self.0 / Decimal::from(n as u64)).round_dp(2))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = SettleError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
