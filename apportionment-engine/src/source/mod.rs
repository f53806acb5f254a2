use std::collections::{BTreeMap, HashMap};

use condo_client::domain::{BillType, Meter, Reading, Unit};
use time::Date;

use crate::{error::SplitError, settings::SettingsMap};

pub mod csv_dir;
pub mod memory;
pub mod postgres;

pub use csv_dir::load_csv_dir;
pub use memory::MemorySource;
pub use postgres::PgSource;

#[derive(Debug, Clone, PartialEq)]
pub struct UnitWithMeters {
    pub unit: Unit,
    pub meters: Vec<Meter>,
}

/// The two readings delimiting a meter's consumption over a period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingBracket {
    /// Latest reading strictly before the period start.
    pub start: Option<Reading>,
    /// Latest reading inside the period, or failing that the latest one not
    /// after the period end.
    pub end: Option<Reading>,
}

/// Resolved brackets keyed by meter id.
pub type ReadingBrackets = HashMap<i64, ReadingBracket>;

/// Read-only access to everything a split calculation needs.
#[async_trait::async_trait]
pub trait SplitDataSource: Send + Sync {
    async fn settings(&self) -> Result<SettingsMap, SplitError>;

    /// Sum of bill amounts of `bill_type` dated within `[from, to]`.
    async fn bill_total(&self, bill_type: BillType, from: Date, to: Date) -> Result<f64, SplitError>;

    async fn units_with_meters(&self) -> Result<Vec<UnitWithMeters>, SplitError>;

    async fn reading_bracket(&self, meter: &Meter, from: Date, to: Date) -> Result<ReadingBracket, SplitError>;
}

/// Attach meters to their units, keeping unit order. Meters of unknown units
/// are dropped.
pub fn group_meters(units: Vec<Unit>, meters: Vec<Meter>) -> Vec<UnitWithMeters> {
    let mut by_unit: HashMap<i64, Vec<Meter>> = HashMap::new();
    for meter in meters {
        by_unit.entry(meter.unit_id).or_default().push(meter);
    }

    units
        .into_iter()
        .map(|unit| {
            let meters = by_unit.remove(&unit.id).unwrap_or_default();
            UnitWithMeters { unit, meters }
        })
        .collect()
}

/// In-memory readings, ordered per meter by (date, id).
#[derive(Debug, Clone, Default)]
pub struct ReadingIndex {
    by_meter: BTreeMap<i64, Vec<Reading>>,
}

impl ReadingIndex {
    pub fn new(readings: impl IntoIterator<Item = Reading>) -> Self {
        let mut by_meter: BTreeMap<i64, Vec<Reading>> = BTreeMap::new();
        for r in readings {
            by_meter.entry(r.meter_id).or_default().push(r);
        }
        for list in by_meter.values_mut() {
            list.sort_by(|a, b| a.reading_date.cmp(&b.reading_date).then(a.id.cmp(&b.id)));
        }
        Self { by_meter }
    }

    pub fn bracket(&self, meter_id: i64, from: Date, to: Date) -> ReadingBracket {
        let Some(list) = self.by_meter.get(&meter_id) else {
            return ReadingBracket::default();
        };

        let start = list.iter().rev().find(|r| r.reading_date < from).cloned();
        let end = list
            .iter()
            .rev()
            .find(|r| r.reading_date >= from && r.reading_date <= to)
            .or_else(|| list.iter().rev().find(|r| r.reading_date <= to))
            .cloned();

        ReadingBracket { start, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{reading, unit};
    use condo_client::domain::MeterType;
    use time::macros::date;

    #[test]
    fn start_is_strictly_before_period() {
        let idx = ReadingIndex::new(vec![
            reading(1, 10, date!(2024 - 01 - 31), 100.0),
            reading(2, 10, date!(2024 - 02 - 01), 105.0),
            reading(3, 10, date!(2024 - 02 - 29), 130.0),
        ]);

        let b = idx.bracket(10, date!(2024 - 02 - 01), date!(2024 - 02 - 29));
        assert_eq!(b.start.unwrap().value, 100.0);
        assert_eq!(b.end.unwrap().value, 130.0);
    }

    #[test]
    fn end_falls_back_to_last_reading_not_after_period_end() {
        // Nothing inside February; a reading exists after the period.
        let idx = ReadingIndex::new(vec![
            reading(1, 10, date!(2024 - 01 - 15), 90.0),
            reading(2, 10, date!(2024 - 01 - 31), 100.0),
            reading(3, 10, date!(2024 - 03 - 05), 160.0),
        ]);

        let b = idx.bracket(10, date!(2024 - 02 - 01), date!(2024 - 02 - 29));
        let end = b.end.unwrap();
        assert_eq!(end.value, 100.0);
        assert_eq!(end.reading_date, date!(2024 - 01 - 31));
    }

    #[test]
    fn no_baseline_leaves_start_empty() {
        let idx = ReadingIndex::new(vec![reading(1, 10, date!(2024 - 02 - 10), 50.0)]);
        let b = idx.bracket(10, date!(2024 - 02 - 01), date!(2024 - 02 - 29));
        assert!(b.start.is_none());
        assert_eq!(b.end.unwrap().value, 50.0);
    }

    #[test]
    fn same_day_readings_resolve_by_id() {
        let idx = ReadingIndex::new(vec![
            reading(7, 10, date!(2024 - 02 - 20), 140.0),
            reading(5, 10, date!(2024 - 02 - 20), 120.0),
            reading(1, 10, date!(2024 - 01 - 20), 100.0),
        ]);
        let b = idx.bracket(10, date!(2024 - 02 - 01), date!(2024 - 02 - 29));
        assert_eq!(b.end.unwrap().id, 7);
    }

    #[test]
    fn unknown_meter_has_empty_bracket() {
        let idx = ReadingIndex::default();
        assert_eq!(
            idx.bracket(99, date!(2024 - 02 - 01), date!(2024 - 02 - 29)),
            ReadingBracket::default()
        );
    }

    #[test]
    fn group_meters_keeps_units_without_meters() {
        let units = vec![unit(1, "A1"), unit(2, "A2")];
        let meters = vec![
            Meter { id: 10, unit_id: 1, meter_type: MeterType::Heating, code: "H-1".into() },
            Meter { id: 11, unit_id: 9, meter_type: MeterType::Heating, code: "H-9".into() },
        ];
        let grouped = group_meters(units, meters);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].meters.len(), 1);
        assert!(grouped[1].meters.is_empty());
    }
}
