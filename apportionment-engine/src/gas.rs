use std::collections::BTreeMap;

use condo_client::domain::{BillType, Unit};
use serde::Serialize;

use crate::{
    consumption::Consumption,
    error::SplitError,
    quota::{deduct, share, Buckets, ConsumptionTotals, Percentages, Redistribution},
    season::Season,
    settings::SplitSettings,
};

/// Fraction of an inhabited unit's involuntary gas share shown as heating;
/// the rest is shown as hot water. Display only, amounts are unaffected.
pub const INVOLUNTARY_HEATING_DISPLAY_SHARE: f64 = 0.1;

/// Fraction of an uninhabited unit's gas forfait shown as heating; the rest
/// is shown as hot water.
pub const FORFAIT_HEATING_DISPLAY_SHARE: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GasCost {
    pub heating: f64,
    pub hot_water: f64,
}

impl GasCost {
    pub fn total(&self) -> f64 {
        self.heating + self.hot_water
    }
}

/// Intermediate values of a gas split, kept for auditing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GasBreakdown {
    pub total_cost: f64,
    pub season: Season,
    pub common_areas: f64,
    pub uninhabited_forfaits: f64,
    pub cost_to_distribute: f64,
    pub percentages: Percentages,
    /// Buckets as planned by the percentages.
    pub planned: Buckets,
    /// Buckets after zero-consumption redistribution.
    pub buckets: Buckets,
    pub redistributed: Vec<Redistribution>,
    pub totals: ConsumptionTotals,
    pub total_surface: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GasSplit {
    pub costs: BTreeMap<i64, GasCost>,
    pub breakdown: GasBreakdown,
}

pub fn gas_forfait(unit: &Unit, season: Season) -> f64 {
    match season {
        Season::Winter => unit.monthly_gas_fixed_winter,
        Season::Summer => unit.monthly_gas_fixed_summer,
    }
}

/// Commercial units take no part in gas, occupied or not.
fn pays_gas_forfait(unit: &Unit) -> bool {
    !unit.is_inhabited && !unit.is_commercial
}

/// Heating and hot water consumed by inhabited residential units.
pub fn gas_consumption_totals(consumptions: &[Consumption]) -> ConsumptionTotals {
    let residential = || consumptions.iter().filter(|c| c.unit.is_residential());
    ConsumptionTotals {
        heating: residential().map(|c| c.heating).sum(),
        cooling: 0.0,
        hot_water: residential().map(|c| c.hot_water).sum(),
        cold_water: 0.0,
    }
}

/// Apportion a gas bill over the units of `consumptions`.
///
/// Every unit gets an entry; commercial units always get zero.
///
/// Common areas and uninhabited forfaits are monthly amounts deducted once
/// per call, whatever the span of the billed period. Split a multi-month
/// period one month at a time to charge them per month.
pub fn split_gas_costs(
    total_gas_cost: f64,
    consumptions: &[Consumption],
    settings: &SplitSettings,
    season: Season,
) -> Result<GasSplit, SplitError> {
    let fuel = BillType::Gas;

    let common_areas = settings.common_areas_gas_monthly;
    let mut remaining = deduct(fuel, "common areas", total_gas_cost, common_areas)?;

    let mut uninhabited_forfaits = 0.0;
    for c in consumptions.iter().filter(|c| pays_gas_forfait(&c.unit)) {
        let forfait = gas_forfait(&c.unit, season);
        remaining = deduct(fuel, "uninhabited forfait", remaining, forfait)?;
        uninhabited_forfaits += forfait;
    }
    let cost_to_distribute = remaining;

    let percentages = settings.gas_percentages(season);
    percentages.check_closure(fuel, season)?;

    let planned = Buckets::allocate(cost_to_distribute, &percentages);

    let totals = gas_consumption_totals(consumptions);
    let total_surface: f64 = consumptions
        .iter()
        .filter(|c| c.unit.is_residential())
        .map(|c| c.unit.surface_area)
        .sum();

    let mut buckets = planned;
    let redistributed = buckets.redistribute_zero_consumption(&percentages, &totals);

    tracing::debug!(
        total_gas_cost,
        common_areas,
        uninhabited_forfaits,
        cost_to_distribute,
        %season,
        involuntary = buckets.involuntary,
        heating = buckets.heating,
        hot_water = buckets.hot_water,
        total_heating = totals.heating,
        total_hot_water = totals.hot_water,
        total_surface,
        redistributed = redistributed.len(),
        "gas buckets resolved"
    );

    if buckets.involuntary > 0.0 && total_surface <= 0.0 {
        return Err(SplitError::InsufficientData(format!(
            "no inhabited residential surface to carry the gas involuntary quota of {:.2}",
            buckets.involuntary
        )));
    }

    let mut costs = BTreeMap::new();
    for c in consumptions {
        let unit = &c.unit;
        let cost = if unit.is_commercial {
            GasCost::default()
        } else if !unit.is_inhabited {
            let forfait = gas_forfait(unit, season);
            GasCost {
                heating: forfait * FORFAIT_HEATING_DISPLAY_SHARE,
                hot_water: forfait * (1.0 - FORFAIT_HEATING_DISPLAY_SHARE),
            }
        } else {
            let involuntary = share(buckets.involuntary, unit.surface_area, total_surface);
            let heating = share(buckets.heating, c.heating, totals.heating);
            let hot_water = share(buckets.hot_water, c.hot_water, totals.hot_water);
            GasCost {
                heating: heating + involuntary * INVOLUNTARY_HEATING_DISPLAY_SHARE,
                hot_water: hot_water + involuntary * (1.0 - INVOLUNTARY_HEATING_DISPLAY_SHARE),
            }
        };
        costs.insert(unit.id, cost);
    }

    Ok(GasSplit {
        costs,
        breakdown: GasBreakdown {
            total_cost: total_gas_cost,
            season,
            common_areas,
            uninhabited_forfaits,
            cost_to_distribute,
            percentages,
            planned,
            buckets,
            redistributed,
            totals,
            total_surface,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::Category;
    use crate::test_support::{assert_close, consumption, unit};

    fn settings() -> SplitSettings {
        let mut s = SplitSettings::default();
        s.common_areas_gas_monthly = 50.0;
        s.gas.involuntary_pct = 40.0;
        s.gas.winter_heating_pct = 40.0;
        s.gas.winter_hot_water_pct = 20.0;
        s.gas.summer_hot_water_pct = 60.0;
        s
    }

    /// Unit A 100 m², unit B 50 m², unit C uninhabited with a 20 forfait.
    fn building() -> Vec<Consumption> {
        let mut a = unit(1, "A");
        a.surface_area = 100.0;
        let b = unit(2, "B");
        let mut c = unit(3, "C");
        c.is_inhabited = false;
        c.monthly_gas_fixed_winter = 20.0;
        c.monthly_gas_fixed_summer = 8.0;

        vec![
            consumption(a, 80.0, 10.0, 0.0),
            consumption(b, 0.0, 10.0, 0.0),
            consumption(c, 0.0, 0.0, 0.0),
        ]
    }

    fn sum(split: &GasSplit) -> f64 {
        split.costs.values().map(GasCost::total).sum()
    }

    #[test]
    fn winter_scenario_matches_hand_computation() {
        let split = split_gas_costs(1000.0, &building(), &settings(), Season::Winter).unwrap();
        let bd = &split.breakdown;

        assert_close(bd.cost_to_distribute, 930.0);
        assert!(bd.redistributed.is_empty());
        assert_close(bd.buckets.involuntary, 372.0);
        assert_close(bd.buckets.heating, 372.0);
        assert_close(bd.buckets.hot_water, 186.0);

        // A: involuntary 248, heating 372, hot water 93.
        let a = split.costs[&1];
        assert_close(a.heating, 24.8 + 372.0);
        assert_close(a.hot_water, 223.2 + 93.0);

        // B: no heating consumption, so no heating share beyond the display
        // part of its involuntary quota.
        let b = split.costs[&2];
        assert_close(b.heating, 12.4);
        assert_close(b.hot_water, 111.6 + 93.0);

        let c = split.costs[&3];
        assert_close(c.heating, 10.0);
        assert_close(c.hot_water, 10.0);

        assert_close(sum(&split) + bd.common_areas, 1000.0);
    }

    #[test]
    fn zero_heating_consumption_moves_heating_bucket_into_involuntary() {
        let mut units = building();
        units[0].heating = 0.0;

        let split = split_gas_costs(1000.0, &units, &settings(), Season::Winter).unwrap();
        let bd = &split.breakdown;

        assert_eq!(bd.redistributed.len(), 1);
        assert_eq!(bd.redistributed[0].category, Category::Heating);
        assert_close(bd.redistributed[0].amount, 372.0);
        assert_close(bd.buckets.involuntary, 744.0);
        assert_eq!(bd.buckets.heating, 0.0);

        // Heating now only carries the 10% display part of the involuntary
        // share: 744 * 100/150 * 0.1 for A.
        assert_close(split.costs[&1].heating, 49.6);
        assert_close(sum(&split), 950.0);
    }

    #[test]
    fn summer_uses_summer_forfait_and_has_no_heating_bucket() {
        let split = split_gas_costs(1000.0, &building(), &settings(), Season::Summer).unwrap();
        let bd = &split.breakdown;

        assert_close(bd.uninhabited_forfaits, 8.0);
        assert_eq!(bd.percentages.heating, 0.0);
        assert_eq!(bd.buckets.heating, 0.0);
        assert!(bd.redistributed.is_empty());
        assert_close(split.costs[&3].total(), 8.0);
        assert_close(sum(&split), 950.0);
    }

    #[test]
    fn commercial_units_pay_no_gas() {
        let mut units = building();
        let mut shop = unit(4, "S1");
        shop.is_commercial = true;
        shop.surface_area = 300.0;
        shop.monthly_gas_fixed_winter = 99.0;
        units.push(consumption(shop.clone(), 500.0, 50.0, 0.0));
        let mut closed_shop = shop;
        closed_shop.id = 5;
        closed_shop.is_inhabited = false;
        units.push(consumption(closed_shop, 0.0, 0.0, 0.0));

        let split = split_gas_costs(1000.0, &units, &settings(), Season::Winter).unwrap();

        assert_eq!(split.costs[&4], GasCost::default());
        assert_eq!(split.costs[&5], GasCost::default());
        // Shop consumption and surface are not part of the totals.
        assert_close(split.breakdown.totals.heating, 80.0);
        assert_close(split.breakdown.total_surface, 150.0);
        assert_close(split.breakdown.uninhabited_forfaits, 20.0);
        assert_close(sum(&split), 950.0);
    }

    #[test]
    fn common_areas_larger_than_bill_is_fatal() {
        let err = split_gas_costs(40.0, &building(), &settings(), Season::Winter).unwrap_err();
        assert!(matches!(
            err,
            SplitError::DeductionOverflow { stage: "common areas", .. }
        ));
    }

    #[test]
    fn forfaits_larger_than_remainder_is_fatal() {
        let err = split_gas_costs(60.0, &building(), &settings(), Season::Winter).unwrap_err();
        assert!(matches!(
            err,
            SplitError::DeductionOverflow { stage: "uninhabited forfait", .. }
        ));
    }

    #[test]
    fn percentages_off_by_more_than_one_point_are_fatal() {
        let mut s = settings();
        s.gas.summer_hot_water_pct = 50.0;
        let err = split_gas_costs(1000.0, &building(), &s, Season::Summer).unwrap_err();
        match err {
            SplitError::PercentageClosure { fuel, season, sum } => {
                assert_eq!(fuel, BillType::Gas);
                assert_eq!(season, Season::Summer);
                assert_close(sum, 90.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn involuntary_quota_without_residential_surface_is_insufficient_data() {
        let mut c = unit(3, "C");
        c.is_inhabited = false;
        let units = vec![consumption(c, 0.0, 0.0, 0.0)];

        let err = split_gas_costs(100.0, &units, &settings(), Season::Winter).unwrap_err();
        assert!(matches!(err, SplitError::InsufficientData(_)));
    }
}
