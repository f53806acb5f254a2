use std::{fmt, str::FromStr, time::Instant};

use condo_client::domain::{BillType, MeterType, Unit};
use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    consumption::{aggregate_consumptions, Consumption, MeterTrace},
    diagnostic::{diagnose_percentages, PercentageDiagnostic},
    electricity::{split_electricity_costs, ElectricityBreakdown, ElectricityCost},
    error::SplitError,
    gas::{split_gas_costs, GasBreakdown, GasCost},
    quota::MONEY_TOLERANCE,
    season::{midpoint_month, Season},
    settings::SplitSettings,
    source::{ReadingBrackets, SplitDataSource},
};

/// Slack added to the 2-cent conservation tolerance for float noise.
const CONSERVATION_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitKind {
    Gas,
    Electricity,
    Both,
}

impl SplitKind {
    pub fn includes(&self, fuel: BillType) -> bool {
        matches!(
            (self, fuel),
            (Self::Both, _) | (Self::Gas, BillType::Gas) | (Self::Electricity, BillType::Electricity)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gas => "gas",
            Self::Electricity => "electricity",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitKind {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gas" => Ok(Self::Gas),
            "electricity" => Ok(Self::Electricity),
            "both" => Ok(Self::Both),
            other => Err(SplitError::Configuration(format!(
                "unknown split type '{other}', expected gas, electricity or both"
            ))),
        }
    }
}

/// Billed amounts per fuel over the period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BillTotals {
    pub gas: f64,
    pub electricity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Period {
    pub date_from: Date,
    pub date_to: Date,
    pub midpoint_month: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UnitCosts {
    pub gas_heating: f64,
    pub gas_hot_water: f64,
    pub elec_staircase_lights: f64,
    pub elec_commercial_water: f64,
    pub elec_fixed: f64,
    pub elec_heating: f64,
    pub elec_cooling: f64,
    pub elec_hot_water: f64,
    pub elec_cold_water: f64,
    pub total: f64,
}

impl UnitCosts {
    fn merge(gas: GasCost, elec: ElectricityCost) -> Self {
        Self {
            gas_heating: gas.heating,
            gas_hot_water: gas.hot_water,
            elec_staircase_lights: elec.staircase_lights,
            elec_commercial_water: elec.commercial_water,
            elec_fixed: elec.fixed,
            elec_heating: elec.heating,
            elec_cooling: elec.cooling,
            elec_hot_water: elec.hot_water,
            elec_cold_water: elec.cold_water,
            total: gas.total() + elec.total(),
        }
    }

    pub fn gas_total(&self) -> f64 {
        self.gas_heating + self.gas_hot_water
    }

    pub fn electricity_total(&self) -> f64 {
        self.elec_staircase_lights
            + self.elec_commercial_water
            + self.elec_fixed
            + self.elec_heating
            + self.elec_cooling
            + self.elec_hot_water
            + self.elec_cold_water
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConsumptionSummary {
    pub heating: f64,
    pub hot_water: f64,
    pub cold_water: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSplit {
    pub unit: Unit,
    pub consumptions: ConsumptionSummary,
    pub readings: Vec<MeterTrace>,
    pub costs: UnitCosts,
}

/// Non-fatal findings surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitWarning {
    MeterAnomaly {
        unit_id: i64,
        unit_number: String,
        meter_id: i64,
        meter_type: MeterType,
        raw_delta: f64,
    },
    FuelSkipped {
        fuel: BillType,
        reason: String,
    },
}

/// Conservation of one fuel: its unit shares plus its common areas against
/// its bills.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FuelVerification {
    pub fuel: BillType,
    pub expected: f64,
    pub units_total: f64,
    pub common_areas: f64,
    pub calculated: f64,
    pub difference: f64,
}

impl FuelVerification {
    fn balanced(&self) -> bool {
        self.difference <= MONEY_TOLERANCE + CONSERVATION_EPSILON
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    /// One entry per fuel that was split.
    pub fuels: Vec<FuelVerification>,
    pub expected_total: f64,
    pub units_total: f64,
    /// Common-area charges: deducted from the bills but owed by no unit.
    pub common_areas_total: f64,
    pub calculated_total: f64,
    pub difference: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitResult {
    pub period: Period,
    pub kind: SplitKind,
    pub season: Season,
    pub total_gas_cost: f64,
    pub total_electricity_cost: f64,
    pub units: Vec<UnitSplit>,
    pub gas: Option<GasBreakdown>,
    pub electricity: Option<ElectricityBreakdown>,
    pub warnings: Vec<SplitWarning>,
    pub verification: Verification,
    /// blake3 of every other field; equal inputs give equal fingerprints.
    pub fingerprint: String,
}

impl SplitResult {
    /// Hash the result with its `fingerprint` field left out.
    pub fn compute_fingerprint(&self) -> Result<String, serde_json::Error> {
        let mut content = serde_json::to_value(self)?;
        if let Some(fields) = content.as_object_mut() {
            fields.remove("fingerprint");
        }
        let bytes = serde_json::to_vec(&content)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    pub fn unit(&self, unit_id: i64) -> Option<&UnitSplit> {
        self.units.iter().find(|u| u.unit.id == unit_id)
    }
}

fn check_bills(kind: SplitKind, bills: BillTotals, from: Date, to: Date) -> Result<(), SplitError> {
    let missing = |what: &str| {
        Err(SplitError::InsufficientData(format!(
            "no {what} bills found between {from} and {to}"
        )))
    };
    match kind {
        SplitKind::Gas if bills.gas <= 0.0 => missing("gas"),
        SplitKind::Electricity if bills.electricity <= 0.0 => missing("electricity"),
        SplitKind::Both if bills.gas <= 0.0 && bills.electricity <= 0.0 => missing("gas or electricity"),
        _ => Ok(()),
    }
}

/// Apportion already-loaded bills over already-aggregated consumptions.
///
/// This is the whole calculation minus the reads; it is deterministic in its
/// inputs.
pub fn apportion(
    date_from: Date,
    date_to: Date,
    kind: SplitKind,
    settings: &SplitSettings,
    bills: BillTotals,
    consumptions: &[Consumption],
) -> Result<SplitResult, SplitError> {
    let month = midpoint_month(date_from, date_to);
    let season = settings.season_for_month(month);

    check_bills(kind, bills, date_from, date_to)?;
    if consumptions.is_empty() {
        return Err(SplitError::InsufficientData(
            "no units or consumption data found".to_string(),
        ));
    }

    let total_gas_cost = if kind.includes(BillType::Gas) { bills.gas } else { 0.0 };
    let total_electricity_cost = if kind.includes(BillType::Electricity) {
        bills.electricity
    } else {
        0.0
    };

    let mut warnings: Vec<SplitWarning> = Vec::new();
    let mut skip = |fuel: BillType, requested: bool, total: f64| -> bool {
        if requested && total <= 0.0 {
            tracing::warn!(%fuel, "no bills for this fuel in the period, fuel skipped");
            warnings.push(SplitWarning::FuelSkipped {
                fuel,
                reason: format!("no {fuel} bills found between {date_from} and {date_to}"),
            });
        }
        !requested || total <= 0.0
    };
    let skip_gas = skip(BillType::Gas, kind.includes(BillType::Gas), total_gas_cost);
    let skip_elec = skip(
        BillType::Electricity,
        kind.includes(BillType::Electricity),
        total_electricity_cost,
    );

    let gas = if skip_gas {
        None
    } else {
        Some(split_gas_costs(total_gas_cost, consumptions, settings, season)?)
    };
    let electricity = if skip_elec {
        None
    } else {
        Some(split_electricity_costs(total_electricity_cost, consumptions, settings, month)?)
    };

    for c in consumptions {
        for t in c.anomalies() {
            warnings.push(SplitWarning::MeterAnomaly {
                unit_id: c.unit.id,
                unit_number: c.unit.number.clone(),
                meter_id: t.meter_id,
                meter_type: t.meter_type,
                raw_delta: t.raw_delta,
            });
        }
    }

    let units: Vec<UnitSplit> = consumptions
        .iter()
        .map(|c| {
            let id = c.unit.id;
            let g = gas.as_ref().and_then(|s| s.costs.get(&id)).copied().unwrap_or_default();
            let e = electricity
                .as_ref()
                .and_then(|s| s.costs.get(&id))
                .copied()
                .unwrap_or_default();
            UnitSplit {
                unit: c.unit.clone(),
                consumptions: ConsumptionSummary {
                    heating: c.heating,
                    hot_water: c.hot_water,
                    cold_water: c.cold_water,
                },
                readings: c.readings.clone(),
                costs: UnitCosts::merge(g, e),
            }
        })
        .collect();

    let mut fuels = Vec::new();
    if let Some(g) = &gas {
        let units_total: f64 = units.iter().map(|u| u.costs.gas_total()).sum();
        fuels.push(verify_fuel(BillType::Gas, total_gas_cost, units_total, g.breakdown.common_areas));
    }
    if let Some(e) = &electricity {
        let units_total: f64 = units.iter().map(|u| u.costs.electricity_total()).sum();
        fuels.push(verify_fuel(
            BillType::Electricity,
            total_electricity_cost,
            units_total,
            e.breakdown.common_areas,
        ));
    }

    if let Some(f) = fuels.iter().find(|f| !f.balanced()) {
        tracing::error!(
            fuel = %f.fuel,
            expected = f.expected,
            calculated = f.calculated,
            difference = f.difference,
            "allocated costs do not add up to the fuel's bills"
        );
        return Err(SplitError::ConservationViolation {
            scope: match f.fuel {
                BillType::Gas => "gas",
                BillType::Electricity => "electricity",
            },
            expected: f.expected,
            calculated: f.calculated,
            difference: f.difference,
        });
    }

    let expected_total = total_gas_cost + total_electricity_cost;
    let units_total: f64 = units.iter().map(|u| u.costs.total).sum();
    let common_areas_total: f64 = fuels.iter().map(|f| f.common_areas).sum();
    let calculated_total = units_total + common_areas_total;
    let difference = (calculated_total - expected_total).abs();

    if difference > MONEY_TOLERANCE + CONSERVATION_EPSILON {
        tracing::error!(
            expected_total,
            calculated_total,
            difference,
            "allocated costs do not add up to the bills"
        );
        return Err(SplitError::ConservationViolation {
            scope: "total",
            expected: expected_total,
            calculated: calculated_total,
            difference,
        });
    }

    let mut result = SplitResult {
        period: Period {
            date_from,
            date_to,
            midpoint_month: month,
        },
        kind,
        season,
        total_gas_cost,
        total_electricity_cost,
        units,
        gas: gas.map(|g| g.breakdown),
        electricity: electricity.map(|e| e.breakdown),
        warnings,
        verification: Verification {
            fuels,
            expected_total,
            units_total,
            common_areas_total,
            calculated_total,
            difference,
            passed: true,
        },
        fingerprint: String::new(),
    };
    result.fingerprint = result.compute_fingerprint()?;

    Ok(result)
}

fn verify_fuel(fuel: BillType, expected: f64, units_total: f64, common_areas: f64) -> FuelVerification {
    let calculated = units_total + common_areas;
    FuelVerification {
        fuel,
        expected,
        units_total,
        common_areas,
        calculated,
        difference: (calculated - expected).abs(),
    }
}

/// Runs split calculations against a data source.
///
/// Holds no state besides the source: concurrent calculations on one engine
/// are independent.
pub struct SplitEngine<S> {
    source: S,
    lookup_concurrency: usize,
}

impl<S> SplitEngine<S>
where
    S: SplitDataSource,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            lookup_concurrency: 8,
        }
    }

    pub fn with_lookup_concurrency(mut self, lookup_concurrency: usize) -> Self {
        self.lookup_concurrency = lookup_concurrency.max(1);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn load_settings(&self) -> Result<SplitSettings, SplitError> {
        SplitSettings::from_map(&self.source.settings().await?)
    }

    /// Resolve every meter's reading bracket and aggregate per unit.
    pub async fn load_consumptions(&self, date_from: Date, date_to: Date) -> Result<Vec<Consumption>, SplitError> {
        let units = self.source.units_with_meters().await?;
        if units.is_empty() {
            return Err(SplitError::InsufficientData(
                "no units or consumption data found".to_string(),
            ));
        }
        if let Some(bad) = units.iter().find(|u| u.unit.surface_area <= 0.0) {
            return Err(SplitError::InvalidData(format!(
                "unit {} has non-positive surface area {}",
                bad.unit.number, bad.unit.surface_area
            )));
        }

        let source = &self.source;
        let brackets: ReadingBrackets = stream::iter(units.iter().flat_map(|u| u.meters.iter()))
            .map(|meter| async move {
                let bracket = source.reading_bracket(meter, date_from, date_to).await?;
                Ok::<_, SplitError>((meter.id, bracket))
            })
            .buffer_unordered(self.lookup_concurrency)
            .try_collect()
            .await?;

        Ok(aggregate_consumptions(date_from, date_to, &units, &brackets))
    }

    /// Apportion the bills of `[date_from, date_to]` over all units.
    pub async fn calculate_monthly_split(
        &self,
        date_from: Date,
        date_to: Date,
        kind: SplitKind,
    ) -> Result<SplitResult, SplitError> {
        let started = Instant::now();
        let res = self.run_split(date_from, date_to, kind).await;

        match &res {
            Ok(result) => {
                metrics::counter!("split_calculations_total").increment(1);
                metrics::histogram!("split_calculation_seconds").record(started.elapsed().as_secs_f64());
                tracing::info!(
                    %date_from,
                    %date_to,
                    %kind,
                    season = %result.season,
                    units = result.units.len(),
                    expected_total = result.verification.expected_total,
                    calculated_total = result.verification.calculated_total,
                    warnings = result.warnings.len(),
                    "split calculated"
                );
            }
            Err(e) => {
                metrics::counter!("split_calculation_failures_total").increment(1);
                tracing::error!(error = %e, %date_from, %date_to, %kind, "split calculation failed");
            }
        }

        res
    }

    async fn run_split(&self, date_from: Date, date_to: Date, kind: SplitKind) -> Result<SplitResult, SplitError> {
        if date_from > date_to {
            return Err(SplitError::Configuration(format!(
                "period start {date_from} is after its end {date_to}"
            )));
        }

        let settings = self.load_settings().await?;

        let mut bills = BillTotals::default();
        if kind.includes(BillType::Gas) {
            bills.gas = self.source.bill_total(BillType::Gas, date_from, date_to).await?;
        }
        if kind.includes(BillType::Electricity) {
            bills.electricity = self
                .source
                .bill_total(BillType::Electricity, date_from, date_to)
                .await?;
        }
        check_bills(kind, bills, date_from, date_to)?;

        let consumptions = self.load_consumptions(date_from, date_to).await?;

        apportion(date_from, date_to, kind, &settings, bills, &consumptions)
    }

    /// Compare the applied redistribution policy with proportional spreading
    /// for the period, without computing any amount.
    pub async fn diagnose_percentages(
        &self,
        date_from: Date,
        date_to: Date,
    ) -> Result<PercentageDiagnostic, SplitError> {
        let settings = self.load_settings().await?;
        let consumptions = self.load_consumptions(date_from, date_to).await?;
        Ok(diagnose_percentages(
            &consumptions,
            &settings,
            midpoint_month(date_from, date_to),
        ))
    }
}
