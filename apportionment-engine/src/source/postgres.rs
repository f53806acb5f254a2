use condo_client::{
    db,
    domain::{BillType, Meter},
};
use sqlx::PgPool;
use time::Date;

use super::{group_meters, ReadingBracket, SplitDataSource, UnitWithMeters};
use crate::{
    error::SplitError,
    settings::{settings_map, SettingsMap},
};

/// Reads settings, units, readings and bills from the application database.
#[derive(Clone)]
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl SplitDataSource for PgSource {
    async fn settings(&self) -> Result<SettingsMap, SplitError> {
        let rows = db::load_settings(&self.pool).await.map_err(SplitError::source)?;
        Ok(settings_map(rows))
    }

    async fn bill_total(&self, bill_type: BillType, from: Date, to: Date) -> Result<f64, SplitError> {
        db::sum_bills(&self.pool, bill_type, from, to)
            .await
            .map_err(SplitError::source)
    }

    async fn units_with_meters(&self) -> Result<Vec<UnitWithMeters>, SplitError> {
        let units = db::list_units(&self.pool).await.map_err(SplitError::source)?;
        let meters = db::list_meters(&self.pool).await.map_err(SplitError::source)?;
        Ok(group_meters(units, meters))
    }

    async fn reading_bracket(&self, meter: &Meter, from: Date, to: Date) -> Result<ReadingBracket, SplitError> {
        let start = db::reading_before(&self.pool, meter.id, from)
            .await
            .map_err(SplitError::source)?;

        let end = match db::latest_reading_between(&self.pool, meter.id, from, to)
            .await
            .map_err(SplitError::source)?
        {
            Some(r) => Some(r),
            None => db::latest_reading_until(&self.pool, meter.id, to)
                .await
                .map_err(SplitError::source)?,
        };

        Ok(ReadingBracket { start, end })
    }
}
