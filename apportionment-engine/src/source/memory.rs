use condo_client::domain::{Bill, BillType, Meter, Reading, Unit};
use time::Date;

use super::{group_meters, ReadingBracket, ReadingIndex, SplitDataSource, UnitWithMeters};
use crate::{error::SplitError, settings::SettingsMap};

/// A data source holding everything in memory.
///
/// Used by tests, by the CSV fixture loader, and by callers that already
/// fetched their data.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    settings: SettingsMap,
    units: Vec<Unit>,
    meters: Vec<Meter>,
    readings: ReadingIndex,
    bills: Vec<Bill>,
}

impl MemorySource {
    pub fn new(
        settings: SettingsMap,
        units: Vec<Unit>,
        meters: Vec<Meter>,
        readings: Vec<Reading>,
        bills: Vec<Bill>,
    ) -> Self {
        Self {
            settings,
            units,
            meters,
            readings: ReadingIndex::new(readings),
            bills,
        }
    }
}

#[async_trait::async_trait]
impl SplitDataSource for MemorySource {
    async fn settings(&self) -> Result<SettingsMap, SplitError> {
        Ok(self.settings.clone())
    }

    async fn bill_total(&self, bill_type: BillType, from: Date, to: Date) -> Result<f64, SplitError> {
        Ok(self
            .bills
            .iter()
            .filter(|b| b.bill_type == bill_type && b.bill_date >= from && b.bill_date <= to)
            .map(|b| b.amount)
            .sum())
    }

    async fn units_with_meters(&self) -> Result<Vec<UnitWithMeters>, SplitError> {
        Ok(group_meters(self.units.clone(), self.meters.clone()))
    }

    async fn reading_bracket(&self, meter: &Meter, from: Date, to: Date) -> Result<ReadingBracket, SplitError> {
        Ok(self.readings.bracket(meter.id, from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::bill;
    use time::macros::date;

    #[tokio::test]
    async fn bill_total_only_counts_matching_type_within_period() {
        let source = MemorySource::new(
            SettingsMap::new(),
            vec![],
            vec![],
            vec![],
            vec![
                bill(1, BillType::Gas, 300.0, date!(2024 - 01 - 31)),
                bill(2, BillType::Gas, 200.0, date!(2024 - 01 - 01)),
                bill(3, BillType::Gas, 999.0, date!(2024 - 02 - 01)),
                bill(4, BillType::Electricity, 120.0, date!(2024 - 01 - 10)),
            ],
        );

        let gas = source
            .bill_total(BillType::Gas, date!(2024 - 01 - 01), date!(2024 - 01 - 31))
            .await
            .unwrap();
        assert_eq!(gas, 500.0);

        let elec = source
            .bill_total(BillType::Electricity, date!(2024 - 01 - 01), date!(2024 - 01 - 31))
            .await
            .unwrap();
        assert_eq!(elec, 120.0);
    }
}
