use std::{fs::File, path::Path, str::FromStr};

use condo_client::domain::{Bill, Meter, Reading, Unit};
use csv::StringRecord;
use time::{macros::format_description, Date};

use super::MemorySource;
use crate::{error::SplitError, settings::SettingsMap};

/// Load a fixture directory into a [`MemorySource`].
///
/// Expected files, each with a header row (columns matched by name):
/// - `units.csv`: id, number, name (optional), surface_area, is_inhabited,
///   is_commercial, has_staircase_lights, and the optional fee columns
///   monthly_water_fixed, monthly_elec_fixed_winter, monthly_elec_fixed_summer,
///   monthly_gas_fixed_winter, monthly_gas_fixed_summer
/// - `meters.csv`: id, unit_id, type, code
/// - `readings.csv`: id, meter_id, reading_date (YYYY-MM-DD), value
/// - `bills.csv`: id, type, amount, bill_date (YYYY-MM-DD)
/// - `settings.csv` (optional): key, value
pub fn load_csv_dir(dir: &Path) -> Result<MemorySource, SplitError> {
    let units = read_file(&dir.join("units.csv"), record_to_unit)?;
    let meters = read_file(&dir.join("meters.csv"), record_to_meter)?;
    let readings = read_file(&dir.join("readings.csv"), record_to_reading)?;
    let bills = read_file(&dir.join("bills.csv"), record_to_bill)?;

    let settings_path = dir.join("settings.csv");
    let settings: SettingsMap = if settings_path.exists() {
        read_file(&settings_path, record_to_setting)?.into_iter().collect()
    } else {
        SettingsMap::new()
    };

    tracing::info!(
        dir = %dir.display(),
        units = units.len(),
        meters = meters.len(),
        readings = readings.len(),
        bills = bills.len(),
        settings = settings.len(),
        "loaded CSV fixture directory"
    );

    Ok(MemorySource::new(settings, units, meters, readings, bills))
}

fn read_file<T>(
    path: &Path,
    convert: fn(&Row<'_>) -> Result<T, SplitError>,
) -> Result<Vec<T>, SplitError> {
    let file = File::open(path)
        .map_err(|e| SplitError::Source(format!("failed to open {}: {e}", path.display())))?;
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let headers = rdr
        .headers()
        .map_err(|e| SplitError::Source(format!("failed to read headers of {}: {e}", path.display())))?
        .clone();

    let mut out = Vec::new();
    for result in rdr.records() {
        let record = result
            .map_err(|e| SplitError::Source(format!("failed to read record of {}: {e}", path.display())))?;
        let row = Row {
            path,
            headers: &headers,
            record: &record,
        };
        match convert(&row) {
            Ok(v) => out.push(v),
            Err(e) => {
                metrics::counter!("split_csv_parse_errors_total").increment(1);
                return Err(e);
            }
        }
    }
    Ok(out)
}

struct Row<'a> {
    path: &'a Path,
    headers: &'a StringRecord,
    record: &'a StringRecord,
}

impl Row<'_> {
    fn opt(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|idx| self.record.get(idx))
            .filter(|v| !v.is_empty())
    }

    fn get(&self, name: &str) -> Result<&str, SplitError> {
        self.opt(name).ok_or_else(|| {
            SplitError::Source(format!("missing column '{name}' in {}", self.path.display()))
        })
    }

    fn parse<T>(&self, name: &str) -> Result<T, SplitError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get(name)?;
        raw.parse()
            .map_err(|e| SplitError::Source(format!("invalid {name} '{raw}' in {}: {e}", self.path.display())))
    }

    fn amount_or_zero(&self, name: &str) -> Result<f64, SplitError> {
        match self.opt(name) {
            Some(_) => self.parse(name),
            None => Ok(0.0),
        }
    }

    fn flag(&self, name: &str) -> Result<bool, SplitError> {
        let raw = self.get(name)?;
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(SplitError::Source(format!(
                "invalid {name} '{raw}' in {}: expected a boolean",
                self.path.display()
            ))),
        }
    }

    fn date(&self, name: &str) -> Result<Date, SplitError> {
        let raw = self.get(name)?;
        Date::parse(raw, format_description!("[year]-[month]-[day]"))
            .map_err(|e| SplitError::Source(format!("invalid {name} '{raw}' in {}: {e}", self.path.display())))
    }
}

fn record_to_unit(row: &Row<'_>) -> Result<Unit, SplitError> {
    let surface_area: f64 = row.parse("surface_area")?;
    if surface_area <= 0.0 {
        return Err(SplitError::InvalidData(format!(
            "surface_area must be positive, got {surface_area} in {}",
            row.path.display()
        )));
    }

    Ok(Unit {
        id: row.parse("id")?,
        number: row.get("number")?.to_string(),
        name: row.opt("name").map(str::to_string),
        surface_area,
        is_inhabited: row.flag("is_inhabited")?,
        is_commercial: row.flag("is_commercial")?,
        has_staircase_lights: row.flag("has_staircase_lights")?,
        monthly_water_fixed: row.amount_or_zero("monthly_water_fixed")?,
        monthly_elec_fixed_winter: row.amount_or_zero("monthly_elec_fixed_winter")?,
        monthly_elec_fixed_summer: row.amount_or_zero("monthly_elec_fixed_summer")?,
        monthly_gas_fixed_winter: row.amount_or_zero("monthly_gas_fixed_winter")?,
        monthly_gas_fixed_summer: row.amount_or_zero("monthly_gas_fixed_summer")?,
    })
}

fn record_to_meter(row: &Row<'_>) -> Result<Meter, SplitError> {
    Ok(Meter {
        id: row.parse("id")?,
        unit_id: row.parse("unit_id")?,
        meter_type: row.parse("type")?,
        code: row.opt("code").unwrap_or_default().to_string(),
    })
}

fn record_to_reading(row: &Row<'_>) -> Result<Reading, SplitError> {
    Ok(Reading {
        id: row.parse("id")?,
        meter_id: row.parse("meter_id")?,
        reading_date: row.date("reading_date")?,
        value: row.parse("value")?,
    })
}

fn record_to_bill(row: &Row<'_>) -> Result<Bill, SplitError> {
    Ok(Bill {
        id: row.parse("id")?,
        bill_type: row.parse("type")?,
        amount: row.parse("amount")?,
        bill_date: row.date("bill_date")?,
    })
}

fn record_to_setting(row: &Row<'_>) -> Result<(String, String), SplitError> {
    Ok((row.get("key")?.to_string(), row.opt("value").unwrap_or_default().to_string()))
}
