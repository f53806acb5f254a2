//! Builders shared by the unit tests.

use condo_client::domain::{Bill, BillType, Meter, MeterType, Reading, Unit};
use time::Date;

use crate::consumption::Consumption;

/// An inhabited residential unit of 50 m² with no fees.
pub fn unit(id: i64, number: &str) -> Unit {
    Unit {
        id,
        number: number.to_string(),
        name: None,
        surface_area: 50.0,
        is_inhabited: true,
        is_commercial: false,
        has_staircase_lights: false,
        monthly_water_fixed: 0.0,
        monthly_elec_fixed_winter: 0.0,
        monthly_elec_fixed_summer: 0.0,
        monthly_gas_fixed_winter: 0.0,
        monthly_gas_fixed_summer: 0.0,
    }
}

pub fn meter(id: i64, unit_id: i64, meter_type: MeterType) -> Meter {
    Meter {
        id,
        unit_id,
        meter_type,
        code: format!("{}-{id}", meter_type.as_str()),
    }
}

pub fn reading(id: i64, meter_id: i64, reading_date: Date, value: f64) -> Reading {
    Reading {
        id,
        meter_id,
        reading_date,
        value,
    }
}

pub fn bill(id: i64, bill_type: BillType, amount: f64, bill_date: Date) -> Bill {
    Bill {
        id,
        bill_type,
        amount,
        bill_date,
    }
}

/// A consumption record with the given metered quantities and no trace.
pub fn consumption(unit: Unit, heating: f64, hot_water: f64, cold_water: f64) -> Consumption {
    Consumption {
        unit,
        heating,
        hot_water,
        cold_water,
        readings: Vec::new(),
    }
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}
