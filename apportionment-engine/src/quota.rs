//! Percentage model shared by the gas and electricity splitters.
//!
//! A bill remainder is cut into an involuntary bucket (apportioned by surface)
//! and up to four voluntary buckets (apportioned by metered consumption).

use condo_client::domain::BillType;
use serde::Serialize;

use crate::{error::SplitError, season::Season};

/// Allowed drift, in percentage points, of a fuel's percentages from 100.
pub const PERCENT_TOLERANCE: f64 = 1.0;

/// Allowed drift, in currency units, between billed and allocated totals.
pub const MONEY_TOLERANCE: f64 = 0.02;

/// Floating-point slack when checking that a remainder stays non-negative.
const DEDUCTION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Heating,
    Cooling,
    HotWater,
    ColdWater,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Heating,
        Category::Cooling,
        Category::HotWater,
        Category::ColdWater,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Percentages {
    pub involuntary: f64,
    pub heating: f64,
    pub cooling: f64,
    pub hot_water: f64,
    pub cold_water: f64,
}

impl Percentages {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Heating => self.heating,
            Category::Cooling => self.cooling,
            Category::HotWater => self.hot_water,
            Category::ColdWater => self.cold_water,
        }
    }

    pub(crate) fn get_mut(&mut self, category: Category) -> &mut f64 {
        match category {
            Category::Heating => &mut self.heating,
            Category::Cooling => &mut self.cooling,
            Category::HotWater => &mut self.hot_water,
            Category::ColdWater => &mut self.cold_water,
        }
    }

    pub fn sum(&self) -> f64 {
        self.involuntary + self.heating + self.cooling + self.hot_water + self.cold_water
    }

    /// Fails unless the involuntary and voluntary percentages add up to 100
    /// within [`PERCENT_TOLERANCE`].
    pub fn check_closure(&self, fuel: BillType, season: Season) -> Result<(), SplitError> {
        let sum = self.sum();
        if (sum - 100.0).abs() > PERCENT_TOLERANCE {
            return Err(SplitError::PercentageClosure { fuel, season, sum });
        }
        Ok(())
    }
}

/// Total metered consumption per category over the units taking part in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConsumptionTotals {
    pub heating: f64,
    /// There is no cooling meter: this mirrors the heating total.
    pub cooling: f64,
    pub hot_water: f64,
    pub cold_water: f64,
}

impl ConsumptionTotals {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Heating => self.heating,
            Category::Cooling => self.cooling,
            Category::HotWater => self.hot_water,
            Category::ColdWater => self.cold_water,
        }
    }
}

/// A voluntary bucket folded into the involuntary one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Redistribution {
    pub category: Category,
    pub amount: f64,
}

/// Money per quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Buckets {
    pub involuntary: f64,
    pub heating: f64,
    pub cooling: f64,
    pub hot_water: f64,
    pub cold_water: f64,
}

impl Buckets {
    /// Every percentage applies to the whole `cost`.
    pub fn allocate(cost: f64, pct: &Percentages) -> Self {
        Self {
            involuntary: cost * pct.involuntary / 100.0,
            heating: cost * pct.heating / 100.0,
            cooling: cost * pct.cooling / 100.0,
            hot_water: cost * pct.hot_water / 100.0,
            cold_water: cost * pct.cold_water / 100.0,
        }
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Heating => self.heating,
            Category::Cooling => self.cooling,
            Category::HotWater => self.hot_water,
            Category::ColdWater => self.cold_water,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut f64 {
        match category {
            Category::Heating => &mut self.heating,
            Category::Cooling => &mut self.cooling,
            Category::HotWater => &mut self.hot_water,
            Category::ColdWater => &mut self.cold_water,
        }
    }

    pub fn total(&self) -> f64 {
        self.involuntary + self.heating + self.cooling + self.hot_water + self.cold_water
    }

    /// Move each bucket whose category had a positive percentage but no
    /// metered consumption into the involuntary bucket, whole.
    ///
    /// A category whose percentage is zero is never moved, whatever its
    /// consumption: there is nothing planned to recover.
    pub fn redistribute_zero_consumption(
        &mut self,
        pct: &Percentages,
        totals: &ConsumptionTotals,
    ) -> Vec<Redistribution> {
        let mut moved = Vec::new();
        for category in Category::ALL {
            if pct.get(category) > 0.0 && totals.get(category) <= 0.0 {
                let slot = self.get_mut(category);
                let amount = *slot;
                *slot = 0.0;
                self.involuntary += amount;
                moved.push(Redistribution { category, amount });
            }
        }
        moved
    }
}

/// Subtract a fixed deduction from a bill remainder, refusing to go negative.
pub(crate) fn deduct(
    fuel: BillType,
    stage: &'static str,
    remaining: f64,
    deduction: f64,
) -> Result<f64, SplitError> {
    let left = remaining - deduction;
    if left < -DEDUCTION_EPSILON {
        return Err(SplitError::DeductionOverflow {
            fuel,
            stage,
            deduction,
            remaining,
        });
    }
    Ok(left.max(0.0))
}

/// `bucket * part / total`, or zero when nothing was consumed.
pub(crate) fn share(bucket: f64, part: f64, total: f64) -> f64 {
    if total > 0.0 {
        bucket * part / total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn winter_elec() -> Percentages {
        Percentages {
            involuntary: 30.0,
            heating: 30.0,
            cooling: 0.0,
            hot_water: 20.0,
            cold_water: 20.0,
        }
    }

    #[test]
    fn closure_accepts_within_one_point() {
        let mut p = winter_elec();
        assert!(p.check_closure(BillType::Electricity, Season::Winter).is_ok());
        p.involuntary = 30.9;
        assert!(p.check_closure(BillType::Electricity, Season::Winter).is_ok());
    }

    #[test]
    fn closure_error_names_fuel_season_and_sum() {
        let mut p = winter_elec();
        p.heating = 40.0;
        let err = p.check_closure(BillType::Electricity, Season::Winter).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("electricity"), "{msg}");
        assert!(msg.contains("winter"), "{msg}");
        assert!(msg.contains("110.00"), "{msg}");
    }

    #[test]
    fn allocation_applies_percentages_to_the_whole_cost() {
        let b = Buckets::allocate(1000.0, &winter_elec());
        assert_eq!(b.involuntary, 300.0);
        assert_eq!(b.heating, 300.0);
        assert_eq!(b.cooling, 0.0);
        assert_eq!(b.hot_water, 200.0);
        assert_eq!(b.cold_water, 200.0);
        assert_eq!(b.total(), 1000.0);
    }

    #[test]
    fn zero_consumption_bucket_moves_into_involuntary_whole() {
        let pct = winter_elec();
        let mut b = Buckets::allocate(1000.0, &pct);
        let totals = ConsumptionTotals {
            heating: 0.0,
            cooling: 0.0,
            hot_water: 12.0,
            cold_water: 30.0,
        };

        let moved = b.redistribute_zero_consumption(&pct, &totals);

        // Cooling has zero consumption too, but a zero percentage.
        assert_eq!(moved, vec![Redistribution { category: Category::Heating, amount: 300.0 }]);
        assert_eq!(b.involuntary, 600.0);
        assert_eq!(b.heating, 0.0);
        assert_eq!(b.hot_water, 200.0);
        assert_eq!(b.total(), 1000.0);
    }

    #[test]
    fn deduction_overflow_reports_values() {
        let err = deduct(BillType::Gas, "common areas", 40.0, 50.0).unwrap_err();
        match err {
            SplitError::DeductionOverflow { fuel, stage, deduction, remaining } => {
                assert_eq!(fuel, BillType::Gas);
                assert_eq!(stage, "common areas");
                assert_eq!(deduction, 50.0);
                assert_eq!(remaining, 40.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(deduct(BillType::Gas, "common areas", 50.0, 50.0).unwrap(), 0.0);
    }

    #[test]
    fn share_is_zero_without_consumption() {
        assert_eq!(share(100.0, 0.0, 0.0), 0.0);
        assert_eq!(share(100.0, 1.0, 4.0), 25.0);
    }
}
