use anyhow::Result;
use sqlx::PgPool;
use time::Date;

use crate::domain::{BillType, Meter, Reading, Setting, Unit};

/// Fetch the whole key/value settings table.
pub async fn load_settings(pool: &PgPool) -> Result<Vec<Setting>> {
    let rows = sqlx::query_as::<_, Setting>(
        r#"
        SELECT key, value
        FROM settings
        ORDER BY key
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list_units(pool: &PgPool) -> Result<Vec<Unit>> {
    let rows = sqlx::query_as::<_, Unit>(
        r#"
        SELECT
            id,
            number,
            name,
            surface_area,
            is_inhabited,
            is_commercial,
            has_staircase_lights,
            COALESCE(monthly_water_fixed, 0)       AS monthly_water_fixed,
            COALESCE(monthly_elec_fixed_winter, 0) AS monthly_elec_fixed_winter,
            COALESCE(monthly_elec_fixed_summer, 0) AS monthly_elec_fixed_summer,
            COALESCE(monthly_gas_fixed_winter, 0)  AS monthly_gas_fixed_winter,
            COALESCE(monthly_gas_fixed_summer, 0)  AS monthly_gas_fixed_summer
        FROM units
        ORDER BY number, id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list_meters(pool: &PgPool) -> Result<Vec<Meter>> {
    let rows = sqlx::query_as::<_, Meter>(
        r#"
        SELECT
            id,
            unit_id,
            type AS meter_type,
            code
        FROM meters
        ORDER BY unit_id, id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Latest reading taken strictly before `date`.
pub async fn reading_before(pool: &PgPool, meter_id: i64, date: Date) -> Result<Option<Reading>> {
    let row = sqlx::query_as::<_, Reading>(
        r#"
        SELECT id, meter_id, reading_date, value
        FROM readings
        WHERE meter_id = $1
          AND reading_date < $2
        ORDER BY reading_date DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(meter_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Latest reading with `from <= reading_date <= to`.
pub async fn latest_reading_between(
    pool: &PgPool,
    meter_id: i64,
    from: Date,
    to: Date,
) -> Result<Option<Reading>> {
    let row = sqlx::query_as::<_, Reading>(
        r#"
        SELECT id, meter_id, reading_date, value
        FROM readings
        WHERE meter_id = $1
          AND reading_date >= $2
          AND reading_date <= $3
        ORDER BY reading_date DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(meter_id)
    .bind(from)
    .bind(to)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Latest reading with `reading_date <= to`, whatever its start.
pub async fn latest_reading_until(pool: &PgPool, meter_id: i64, to: Date) -> Result<Option<Reading>> {
    let row = sqlx::query_as::<_, Reading>(
        r#"
        SELECT id, meter_id, reading_date, value
        FROM readings
        WHERE meter_id = $1
          AND reading_date <= $2
        ORDER BY reading_date DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(meter_id)
    .bind(to)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Sum of bill amounts of one type dated within `[from, to]`.
pub async fn sum_bills(pool: &PgPool, bill_type: BillType, from: Date, to: Date) -> Result<f64> {
    let total: Option<f64> = sqlx::query_scalar(
        r#"
        SELECT SUM(amount)::DOUBLE PRECISION
        FROM bills
        WHERE type = $1
          AND bill_date >= $2
          AND bill_date <= $3
        "#,
    )
    .bind(bill_type.as_str())
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    Ok(total.unwrap_or(0.0))
}
