//! Side-by-side view of how zero-consumption categories could be absorbed.
//!
//! The splitters fold an unconsumed category into the involuntary quota.
//! The proportional variant here spreads it across the voluntary categories
//! that did see consumption instead. It is only reported, never used to
//! compute amounts, and the two are allowed to disagree.

use condo_client::domain::BillType;
use serde::Serialize;

use crate::{
    consumption::Consumption,
    electricity::electricity_consumption_totals,
    gas::gas_consumption_totals,
    quota::{Buckets, Category, ConsumptionTotals, Percentages},
    season::Season,
    settings::SplitSettings,
};

/// Spread the percentage of every unconsumed category over the consumed
/// ones, in proportion to their own percentages. When no voluntary category
/// was consumed at all, the freed percentage goes to involuntary.
pub fn proportional_redistribution(pct: &Percentages, totals: &ConsumptionTotals) -> Percentages {
    let (unconsumed, consumed): (Vec<Category>, Vec<Category>) = Category::ALL
        .into_iter()
        .filter(|c| pct.get(*c) > 0.0)
        .partition(|c| totals.get(*c) <= 0.0);

    let freed: f64 = unconsumed.iter().map(|c| pct.get(*c)).sum();
    if freed <= 0.0 {
        return *pct;
    }

    let mut effective = *pct;
    for c in &unconsumed {
        *effective.get_mut(*c) = 0.0;
    }

    let consumed_pct: f64 = consumed.iter().map(|c| pct.get(*c)).sum();
    if consumed_pct > 0.0 {
        for c in &consumed {
            *effective.get_mut(*c) += freed * pct.get(*c) / consumed_pct;
        }
    } else {
        effective.involuntary += freed;
    }
    effective
}

/// The splitters' policy expressed as percentages.
pub fn involuntary_redistribution(pct: &Percentages, totals: &ConsumptionTotals) -> Percentages {
    let mut b = Buckets::allocate(100.0, pct);
    b.redistribute_zero_consumption(pct, totals);
    Percentages {
        involuntary: b.involuntary,
        heating: b.heating,
        cooling: b.cooling,
        hot_water: b.hot_water,
        cold_water: b.cold_water,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelDiagnostic {
    pub fuel: BillType,
    pub configured: Percentages,
    pub closure_sum: f64,
    pub totals: ConsumptionTotals,
    pub unconsumed: Vec<Category>,
    /// Effective percentages as applied by the splitter.
    pub applied: Percentages,
    /// Effective percentages under proportional spreading.
    pub proportional: Percentages,
    pub diverges: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentageDiagnostic {
    pub month: u8,
    pub season: Season,
    pub gas: FuelDiagnostic,
    pub electricity: FuelDiagnostic,
}

fn fuel_diagnostic(fuel: BillType, configured: Percentages, totals: ConsumptionTotals) -> FuelDiagnostic {
    let applied = involuntary_redistribution(&configured, &totals);
    let proportional = proportional_redistribution(&configured, &totals);
    let unconsumed = Category::ALL
        .into_iter()
        .filter(|c| configured.get(*c) > 0.0 && totals.get(*c) <= 0.0)
        .collect();

    FuelDiagnostic {
        fuel,
        configured,
        closure_sum: configured.sum(),
        totals,
        unconsumed,
        diverges: applied != proportional,
        applied,
        proportional,
    }
}

/// Compare both redistribution policies for each fuel. Never fails: a
/// percentage model that does not close is reported through `closure_sum`.
pub fn diagnose_percentages(
    consumptions: &[Consumption],
    settings: &SplitSettings,
    month: u8,
) -> PercentageDiagnostic {
    let season = settings.season_for_month(month);
    PercentageDiagnostic {
        month,
        season,
        gas: fuel_diagnostic(
            BillType::Gas,
            settings.gas_percentages(season),
            gas_consumption_totals(consumptions),
        ),
        electricity: fuel_diagnostic(
            BillType::Electricity,
            settings.electricity_percentages(season),
            electricity_consumption_totals(consumptions),
        ),
    }
}
