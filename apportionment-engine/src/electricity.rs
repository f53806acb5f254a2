use std::collections::BTreeMap;

use condo_client::domain::{BillType, Unit};
use serde::Serialize;

use crate::{
    consumption::Consumption,
    error::SplitError,
    quota::{deduct, share, Buckets, ConsumptionTotals, Percentages, Redistribution, MONEY_TOLERANCE},
    season::Season,
    settings::SplitSettings,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ElectricityCost {
    pub staircase_lights: f64,
    pub commercial_water: f64,
    /// Involuntary quota for residential units, forfait for uninhabited ones.
    pub fixed: f64,
    pub heating: f64,
    pub cooling: f64,
    pub hot_water: f64,
    pub cold_water: f64,
}

impl ElectricityCost {
    pub fn total(&self) -> f64 {
        self.staircase_lights
            + self.commercial_water
            + self.fixed
            + self.heating
            + self.cooling
            + self.hot_water
            + self.cold_water
    }
}

/// Re-addition of every deduction and share against the billed amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsistencyCheck {
    pub expected: f64,
    pub calculated: f64,
    pub difference: f64,
    pub consistent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElectricityBreakdown {
    pub total_cost: f64,
    pub month: u8,
    pub season: Season,
    pub common_areas: f64,
    pub staircase_units: usize,
    pub staircase_lights: f64,
    pub commercial_water: f64,
    pub uninhabited_forfaits: f64,
    pub cost_to_distribute: f64,
    pub percentages: Percentages,
    pub planned: Buckets,
    pub buckets: Buckets,
    pub redistributed: Vec<Redistribution>,
    pub totals: ConsumptionTotals,
    pub total_surface: f64,
    pub consistency: ConsistencyCheck,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElectricitySplit {
    pub costs: BTreeMap<i64, ElectricityCost>,
    pub breakdown: ElectricityBreakdown,
}

pub fn elec_forfait(unit: &Unit, season: Season) -> f64 {
    match season {
        Season::Winter => unit.monthly_elec_fixed_winter,
        Season::Summer => unit.monthly_elec_fixed_summer,
    }
}

fn pays_staircase_lights(unit: &Unit) -> bool {
    unit.is_inhabited && unit.has_staircase_lights
}

/// Consumption totals for the electricity quotas. Commercial units only take
/// part in cold water; cooling is read off the heating meters.
pub fn electricity_consumption_totals(consumptions: &[Consumption]) -> ConsumptionTotals {
    let residential = || consumptions.iter().filter(|c| c.unit.is_residential());
    let total_heating: f64 = residential().map(|c| c.heating).sum();
    ConsumptionTotals {
        heating: total_heating,
        cooling: total_heating,
        hot_water: residential().map(|c| c.hot_water).sum(),
        cold_water: consumptions
            .iter()
            .filter(|c| c.unit.is_inhabited)
            .map(|c| c.cold_water)
            .sum(),
    }
}

/// Apportion an electricity bill for the period whose midpoint falls in
/// `month`.
///
/// Fixed amounts come off the bill first, in order: common areas, staircase
/// lights, commercial water forfaits, uninhabited forfaits. What is left is
/// split by the seasonal percentage model.
///
/// All four are monthly amounts deducted once per call, whatever the span of
/// the billed period.
///
/// The closing consistency check only reports a mismatch in the breakdown;
/// the caller decides whether it is fatal.
pub fn split_electricity_costs(
    total_elec_cost: f64,
    consumptions: &[Consumption],
    settings: &SplitSettings,
    month: u8,
) -> Result<ElectricitySplit, SplitError> {
    let fuel = BillType::Electricity;
    let season = settings.season_for_month(month);

    let common_areas = settings.common_areas_elec_monthly;
    let mut remaining = deduct(fuel, "common areas", total_elec_cost, common_areas)?;

    let staircase_units = consumptions.iter().filter(|c| pays_staircase_lights(&c.unit)).count();
    let staircase_lights = settings.staircase_lights_monthly * staircase_units as f64;
    remaining = deduct(fuel, "staircase lights", remaining, staircase_lights)?;

    let commercial_water: f64 = consumptions
        .iter()
        .filter(|c| c.unit.is_inhabited && c.unit.is_commercial)
        .map(|c| c.unit.monthly_water_fixed)
        .sum();
    remaining = deduct(fuel, "commercial water forfait", remaining, commercial_water)?;

    let mut uninhabited_forfaits = 0.0;
    for c in consumptions.iter().filter(|c| !c.unit.is_inhabited) {
        let forfait = elec_forfait(&c.unit, season);
        remaining = deduct(fuel, "uninhabited forfait", remaining, forfait)?;
        uninhabited_forfaits += forfait;
    }
    let cost_to_distribute = remaining;

    let percentages = settings.electricity_percentages(season);
    percentages.check_closure(fuel, season)?;

    let planned = Buckets::allocate(cost_to_distribute, &percentages);

    let totals = electricity_consumption_totals(consumptions);
    let total_surface: f64 = consumptions
        .iter()
        .filter(|c| c.unit.is_residential())
        .map(|c| c.unit.surface_area)
        .sum();

    let mut buckets = planned;
    let redistributed = buckets.redistribute_zero_consumption(&percentages, &totals);

    tracing::debug!(
        total_elec_cost,
        common_areas,
        staircase_units,
        staircase_lights,
        commercial_water,
        uninhabited_forfaits,
        cost_to_distribute,
        month,
        %season,
        involuntary = buckets.involuntary,
        heating = buckets.heating,
        cooling = buckets.cooling,
        hot_water = buckets.hot_water,
        cold_water = buckets.cold_water,
        total_surface,
        redistributed = redistributed.len(),
        "electricity buckets resolved"
    );

    if buckets.involuntary > 0.0 && total_surface <= 0.0 {
        return Err(SplitError::InsufficientData(format!(
            "no inhabited residential surface to carry the electricity involuntary quota of {:.2}",
            buckets.involuntary
        )));
    }

    let mut costs = BTreeMap::new();
    for c in consumptions {
        let unit = &c.unit;
        let staircase = if pays_staircase_lights(unit) {
            settings.staircase_lights_monthly
        } else {
            0.0
        };

        let cost = if !unit.is_inhabited {
            ElectricityCost {
                fixed: elec_forfait(unit, season),
                ..ElectricityCost::default()
            }
        } else if unit.is_commercial {
            ElectricityCost {
                staircase_lights: staircase,
                commercial_water: unit.monthly_water_fixed,
                cold_water: share(buckets.cold_water, c.cold_water, totals.cold_water),
                ..ElectricityCost::default()
            }
        } else {
            ElectricityCost {
                staircase_lights: staircase,
                commercial_water: 0.0,
                fixed: share(buckets.involuntary, unit.surface_area, total_surface),
                heating: share(buckets.heating, c.heating, totals.heating),
                cooling: share(buckets.cooling, c.heating, totals.cooling),
                hot_water: share(buckets.hot_water, c.hot_water, totals.hot_water),
                cold_water: share(buckets.cold_water, c.cold_water, totals.cold_water),
            }
        };
        costs.insert(unit.id, cost);
    }

    let calculated = common_areas + costs.values().map(ElectricityCost::total).sum::<f64>();
    let difference = (calculated - total_elec_cost).abs();
    let consistent = difference <= MONEY_TOLERANCE;
    if !consistent {
        tracing::warn!(
            expected = total_elec_cost,
            calculated,
            difference,
            "electricity split does not add up to the bill"
        );
    }

    Ok(ElectricitySplit {
        costs,
        breakdown: ElectricityBreakdown {
            total_cost: total_elec_cost,
            month,
            season,
            common_areas,
            staircase_units,
            staircase_lights,
            commercial_water,
            uninhabited_forfaits,
            cost_to_distribute,
            percentages,
            planned,
            buckets,
            redistributed,
            totals,
            total_surface,
            consistency: ConsistencyCheck {
                expected: total_elec_cost,
                calculated,
                difference,
                consistent,
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::Category;
    use crate::test_support::{assert_close, consumption, unit};

    const JANUARY: u8 = 1;
    const JULY: u8 = 7;

    fn settings() -> SplitSettings {
        let mut s = SplitSettings::default();
        s.common_areas_elec_monthly = 30.0;
        s.staircase_lights_monthly = 10.0;
        s
    }

    fn building() -> Vec<Consumption> {
        let mut a = unit(1, "A");
        a.surface_area = 100.0;
        a.has_staircase_lights = true;

        let b = unit(2, "B");

        let mut shop = unit(3, "S");
        shop.surface_area = 80.0;
        shop.is_commercial = true;
        shop.monthly_water_fixed = 15.0;

        let mut empty = unit(4, "U");
        empty.is_inhabited = false;
        empty.has_staircase_lights = true;
        empty.monthly_elec_fixed_winter = 12.0;
        empty.monthly_elec_fixed_summer = 7.0;

        vec![
            consumption(a, 60.0, 10.0, 20.0),
            consumption(b, 40.0, 10.0, 20.0),
            consumption(shop, 500.0, 5.0, 60.0),
            consumption(empty, 0.0, 0.0, 0.0),
        ]
    }

    fn sum(split: &ElectricitySplit) -> f64 {
        split.costs.values().map(ElectricityCost::total).sum()
    }

    #[test]
    fn winter_deduction_chain_and_shares() {
        let split = split_electricity_costs(1000.0, &building(), &settings(), JANUARY).unwrap();
        let bd = &split.breakdown;

        assert_eq!(bd.season, Season::Winter);
        assert_eq!(bd.staircase_units, 1);
        assert_close(bd.staircase_lights, 10.0);
        assert_close(bd.commercial_water, 15.0);
        assert_close(bd.uninhabited_forfaits, 12.0);
        assert_close(bd.cost_to_distribute, 933.0);
        assert!(bd.redistributed.is_empty());
        assert_close(bd.totals.cold_water, 100.0);
        assert_close(bd.total_surface, 150.0);

        let a = split.costs[&1];
        assert_close(a.fixed, 186.6);
        assert_close(a.heating, 167.94);
        assert_eq!(a.cooling, 0.0);
        assert_close(a.hot_water, 93.3);
        assert_close(a.cold_water, 37.32);
        assert_close(a.staircase_lights, 10.0);

        let b = split.costs[&2];
        assert_close(b.fixed, 93.3);
        assert_close(b.heating, 111.96);
        assert_eq!(b.staircase_lights, 0.0);

        let shop = split.costs[&3];
        assert_close(shop.commercial_water, 15.0);
        assert_close(shop.cold_water, 111.96);
        assert_eq!(shop.fixed, 0.0);
        assert_eq!(shop.heating, 0.0);
        assert_eq!(shop.hot_water, 0.0);

        assert_eq!(
            split.costs[&4],
            ElectricityCost {
                fixed: 12.0,
                ..ElectricityCost::default()
            }
        );

        assert!(bd.consistency.consistent);
        assert_close(sum(&split) + bd.common_areas, 1000.0);
    }

    #[test]
    fn summer_heating_rate_is_structurally_zero_and_never_redistributed() {
        let split = split_electricity_costs(1000.0, &building(), &settings(), JULY).unwrap();
        let bd = &split.breakdown;

        assert_eq!(bd.season, Season::Summer);
        assert_close(bd.uninhabited_forfaits, 7.0);
        assert_eq!(bd.percentages.heating, 0.0);
        assert!(bd.redistributed.is_empty());
        assert_close(bd.buckets.involuntary, bd.planned.involuntary);

        // Cooling follows the heating meters.
        let a = split.costs[&1];
        assert_eq!(a.heating, 0.0);
        assert_close(a.cooling, bd.buckets.cooling * 0.6);
        assert_close(sum(&split) + bd.common_areas, 1000.0);
    }

    #[test]
    fn summer_without_heating_consumption_only_redistributes_cooling() {
        let mut units = building();
        units[0].heating = 0.0;
        units[1].heating = 0.0;

        let split = split_electricity_costs(1000.0, &units, &settings(), JULY).unwrap();
        let bd = &split.breakdown;

        let moved: Vec<Category> = bd.redistributed.iter().map(|r| r.category).collect();
        assert_eq!(moved, vec![Category::Cooling]);
        assert_close(bd.buckets.involuntary, bd.planned.involuntary + bd.planned.cooling);
        assert!(split.costs.values().all(|c| c.cooling == 0.0 && c.heating == 0.0));
        assert_close(sum(&split) + bd.common_areas, 1000.0);
    }

    #[test]
    fn zero_cold_water_everywhere_moves_cold_water_into_involuntary() {
        let mut units = building();
        for c in &mut units {
            c.cold_water = 0.0;
        }

        let split = split_electricity_costs(1000.0, &units, &settings(), JANUARY).unwrap();
        let bd = &split.breakdown;

        assert_eq!(bd.redistributed.len(), 1);
        assert_eq!(bd.redistributed[0].category, Category::ColdWater);
        assert!(split.costs.values().all(|c| c.cold_water == 0.0));
        // The shop still pays its water forfait and nothing else.
        assert_close(split.costs[&3].total(), 15.0);
        assert_close(sum(&split) + bd.common_areas, 1000.0);
    }

    #[test]
    fn flagged_commercial_unit_pays_the_staircase_fee_it_was_counted_for() {
        let mut units = building();
        units[2].unit.has_staircase_lights = true;

        let split = split_electricity_costs(1000.0, &units, &settings(), JANUARY).unwrap();

        assert_eq!(split.breakdown.staircase_units, 2);
        assert_close(split.costs[&3].staircase_lights, 10.0);
        assert!(split.breakdown.consistency.consistent);
    }

    #[test]
    fn staircase_lights_exceeding_remainder_is_fatal() {
        let mut s = settings();
        s.staircase_lights_monthly = 500.0;
        let err = split_electricity_costs(100.0, &building(), &s, JANUARY).unwrap_err();
        assert!(matches!(
            err,
            SplitError::DeductionOverflow { stage: "staircase lights", .. }
        ));
    }

    #[test]
    fn commercial_water_exceeding_remainder_is_fatal() {
        let err = split_electricity_costs(45.0, &building(), &settings(), JANUARY).unwrap_err();
        assert!(matches!(
            err,
            SplitError::DeductionOverflow { stage: "commercial water forfait", .. }
        ));
    }

    #[test]
    fn summer_percentages_must_close() {
        let mut s = settings();
        s.electricity.summer_cooling_pct = 45.0;
        let err = split_electricity_costs(1000.0, &building(), &s, JULY).unwrap_err();
        assert!(matches!(
            err,
            SplitError::PercentageClosure {
                fuel: BillType::Electricity,
                season: Season::Summer,
                ..
            }
        ));
    }
}
