use condo_client::domain::BillType;

use crate::season::Season;

/// Fatal failures of a split calculation. No partial result is returned
/// alongside any of these.
#[derive(thiserror::Error, Debug)]
pub enum SplitError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(
        "configuration error: {fuel} percentages for {season} sum to {sum:.2}% instead of 100%"
    )]
    PercentageClosure {
        fuel: BillType,
        season: Season,
        sum: f64,
    },
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error(
        "{fuel} deduction '{stage}' of {deduction:.2} exceeds the remaining bill amount {remaining:.2}"
    )]
    DeductionOverflow {
        fuel: BillType,
        stage: &'static str,
        deduction: f64,
        remaining: f64,
    },
    #[error(
        "{scope} conservation violated: expected {expected:.2}, calculated {calculated:.2} (difference {difference:.4})"
    )]
    ConservationViolation {
        /// `gas`, `electricity` or `total`.
        scope: &'static str,
        expected: f64,
        calculated: f64,
        difference: f64,
    },
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("data source error: {0}")]
    Source(String),
    #[error("failed to serialize split result: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SplitError {
    pub(crate) fn source<E: std::fmt::Display>(e: E) -> Self {
        Self::Source(e.to_string())
    }
}
