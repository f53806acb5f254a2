use condo_client::domain::{MeterType, Unit};
use serde::Serialize;
use time::Date;

use crate::source::{ReadingBrackets, UnitWithMeters};

/// Audit entry for one meter whose bracket resolved on both ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterTrace {
    pub meter_id: i64,
    pub meter_type: MeterType,
    pub code: String,
    pub start_value: f64,
    pub start_date: Date,
    pub end_value: f64,
    pub end_date: Date,
    pub raw_delta: f64,
    /// `raw_delta` clamped at zero.
    pub consumption: f64,
    /// The index went backwards, most likely a replaced or reset meter.
    pub anomaly: bool,
}

/// What a unit consumed over the period, with the attributes the splitters
/// need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Consumption {
    pub unit: Unit,
    pub heating: f64,
    pub hot_water: f64,
    pub cold_water: f64,
    pub readings: Vec<MeterTrace>,
}

impl Consumption {
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            heating: 0.0,
            hot_water: 0.0,
            cold_water: 0.0,
            readings: Vec::new(),
        }
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &MeterTrace> {
        self.readings.iter().filter(|t| t.anomaly)
    }

    fn add(&mut self, meter_type: MeterType, quantity: f64) {
        match meter_type {
            MeterType::Heating => self.heating += quantity,
            MeterType::HotWater => self.hot_water += quantity,
            MeterType::ColdWater => self.cold_water += quantity,
        }
    }
}

/// Build one consumption record per unit from resolved reading brackets.
///
/// A meter missing either end of its bracket contributes nothing and leaves
/// no trace. A negative delta is clamped to zero and flagged.
pub fn aggregate_consumptions(
    date_from: Date,
    date_to: Date,
    units: &[UnitWithMeters],
    brackets: &ReadingBrackets,
) -> Vec<Consumption> {
    let mut out = Vec::with_capacity(units.len());

    for uwm in units {
        let mut c = Consumption::new(uwm.unit.clone());

        for meter in &uwm.meters {
            let Some(bracket) = brackets.get(&meter.id) else {
                continue;
            };
            let (Some(start), Some(end)) = (&bracket.start, &bracket.end) else {
                tracing::debug!(
                    unit = %uwm.unit.number,
                    meter_id = meter.id,
                    meter_type = %meter.meter_type,
                    has_start = bracket.start.is_some(),
                    has_end = bracket.end.is_some(),
                    "meter skipped: incomplete reading bracket"
                );
                continue;
            };

            let raw_delta = end.value - start.value;
            let anomaly = raw_delta < 0.0;
            let consumption = raw_delta.max(0.0);

            if anomaly {
                tracing::warn!(
                    unit = %uwm.unit.number,
                    meter_id = meter.id,
                    meter_code = %meter.code,
                    start_value = start.value,
                    end_value = end.value,
                    raw_delta,
                    %date_from,
                    %date_to,
                    "negative meter delta, clamped to zero (meter replaced or reset?)"
                );
                metrics::counter!("split_meter_anomalies_total").increment(1);
            }

            c.add(meter.meter_type, consumption);
            c.readings.push(MeterTrace {
                meter_id: meter.id,
                meter_type: meter.meter_type,
                code: meter.code.clone(),
                start_value: start.value,
                start_date: start.reading_date,
                end_value: end.value,
                end_date: end.reading_date,
                raw_delta,
                consumption,
                anomaly,
            });
        }

        out.push(c);
    }

    out
}
