use std::collections::BTreeMap;

use condo_client::domain::Setting;

use crate::{
    error::SplitError,
    quota::Percentages,
    season::{resolve_season, Season},
};

/// Raw settings as read from the store: a flat key to string mapping.
pub type SettingsMap = BTreeMap<String, String>;

/// Collect stored setting rows into a map. A repeated key keeps its last value.
pub fn settings_map(rows: impl IntoIterator<Item = Setting>) -> SettingsMap {
    rows.into_iter().map(|s| (s.key, s.value)).collect()
}

/// Gas percentage model. The involuntary quota is shared by both seasons.
#[derive(Debug, Clone, PartialEq)]
pub struct GasRates {
    pub involuntary_pct: f64,
    pub winter_heating_pct: f64,
    pub winter_hot_water_pct: f64,
    pub summer_hot_water_pct: f64,
}

/// Electricity percentage model. Heating is a winter category, cooling a
/// summer one; water categories are active all year.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectricityRates {
    pub involuntary_pct: f64,
    pub winter_heating_pct: f64,
    pub winter_hot_water_pct: f64,
    pub winter_cold_water_pct: f64,
    pub summer_cooling_pct: f64,
    pub summer_hot_water_pct: f64,
    pub summer_cold_water_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitSettings {
    pub summer_start_month: u8,
    pub summer_end_month: u8,
    pub gas: GasRates,
    pub electricity: ElectricityRates,
    pub common_areas_gas_monthly: f64,
    pub common_areas_elec_monthly: f64,
    pub staircase_lights_monthly: f64,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            summer_start_month: 5,
            summer_end_month: 9,
            gas: GasRates {
                involuntary_pct: 40.0,
                winter_heating_pct: 40.0,
                winter_hot_water_pct: 20.0,
                summer_hot_water_pct: 60.0,
            },
            electricity: ElectricityRates {
                involuntary_pct: 30.0,
                winter_heating_pct: 30.0,
                winter_hot_water_pct: 20.0,
                winter_cold_water_pct: 20.0,
                summer_cooling_pct: 30.0,
                summer_hot_water_pct: 20.0,
                summer_cold_water_pct: 20.0,
            },
            common_areas_gas_monthly: 0.0,
            common_areas_elec_monthly: 0.0,
            staircase_lights_monthly: 0.0,
        }
    }
}

fn read_f64(map: &SettingsMap, key: &str, default: f64) -> Result<f64, SplitError> {
    match map.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
            _ => Err(SplitError::Configuration(format!(
                "setting '{key}' must be a non-negative number, got '{raw}'"
            ))),
        },
    }
}

fn read_month(map: &SettingsMap, key: &str, default: u8) -> Result<u8, SplitError> {
    match map.get(key).map(|v| v.trim()) {
        None | Some("") => Ok(default),
        Some(raw) => match raw.parse::<u8>() {
            Ok(m) if (1..=12).contains(&m) => Ok(m),
            _ => Err(SplitError::Configuration(format!(
                "setting '{key}' must be a month between 1 and 12, got '{raw}'"
            ))),
        },
    }
}

impl SplitSettings {
    /// Parse the settings map, falling back to defaults for missing keys.
    pub fn from_map(map: &SettingsMap) -> Result<Self, SplitError> {
        let d = Self::default();

        let summer_start_month = read_month(map, "summer_start_month", d.summer_start_month)?;
        let summer_end_month = read_month(map, "summer_end_month", d.summer_end_month)?;
        if summer_start_month > summer_end_month {
            return Err(SplitError::Configuration(format!(
                "summer_start_month ({summer_start_month}) is after summer_end_month ({summer_end_month}); \
                 a summer spanning the new year is not supported"
            )));
        }

        let gas = GasRates {
            involuntary_pct: read_f64(map, "gas_involuntary_pct", d.gas.involuntary_pct)?,
            winter_heating_pct: read_f64(map, "gas_winter_heating_pct", d.gas.winter_heating_pct)?,
            winter_hot_water_pct: read_f64(map, "gas_winter_hot_water_pct", d.gas.winter_hot_water_pct)?,
            summer_hot_water_pct: read_f64(map, "gas_summer_hot_water_pct", d.gas.summer_hot_water_pct)?,
        };

        let e = &d.electricity;
        let electricity = ElectricityRates {
            involuntary_pct: read_f64(map, "elec_involuntary_pct", e.involuntary_pct)?,
            winter_heating_pct: read_f64(map, "elec_winter_heating_pct", e.winter_heating_pct)?,
            winter_hot_water_pct: read_f64(map, "elec_winter_hot_water_pct", e.winter_hot_water_pct)?,
            winter_cold_water_pct: read_f64(map, "elec_winter_cold_water_pct", e.winter_cold_water_pct)?,
            summer_cooling_pct: read_f64(map, "elec_summer_cooling_pct", e.summer_cooling_pct)?,
            summer_hot_water_pct: read_f64(map, "elec_summer_hot_water_pct", e.summer_hot_water_pct)?,
            summer_cold_water_pct: read_f64(map, "elec_summer_cold_water_pct", e.summer_cold_water_pct)?,
        };

        Ok(Self {
            summer_start_month,
            summer_end_month,
            gas,
            electricity,
            common_areas_gas_monthly: read_f64(map, "common_areas_gas_monthly", d.common_areas_gas_monthly)?,
            common_areas_elec_monthly: read_f64(map, "common_areas_elec_monthly", d.common_areas_elec_monthly)?,
            staircase_lights_monthly: read_f64(map, "staircase_lights_monthly", d.staircase_lights_monthly)?,
        })
    }

    pub fn season_for_month(&self, month: u8) -> Season {
        resolve_season(month, self.summer_start_month, self.summer_end_month)
    }

    /// Seasonal gas percentages. Summer forces heating to zero.
    pub fn gas_percentages(&self, season: Season) -> Percentages {
        let g = &self.gas;
        match season {
            Season::Winter => Percentages {
                involuntary: g.involuntary_pct,
                heating: g.winter_heating_pct,
                hot_water: g.winter_hot_water_pct,
                ..Percentages::default()
            },
            Season::Summer => Percentages {
                involuntary: g.involuntary_pct,
                heating: 0.0,
                hot_water: g.summer_hot_water_pct,
                ..Percentages::default()
            },
        }
    }

    /// Seasonal electricity percentages: heating only in winter, cooling only
    /// in summer.
    pub fn electricity_percentages(&self, season: Season) -> Percentages {
        let e = &self.electricity;
        match season {
            Season::Winter => Percentages {
                involuntary: e.involuntary_pct,
                heating: e.winter_heating_pct,
                cooling: 0.0,
                hot_water: e.winter_hot_water_pct,
                cold_water: e.winter_cold_water_pct,
            },
            Season::Summer => Percentages {
                involuntary: e.involuntary_pct,
                heating: 0.0,
                cooling: e.summer_cooling_pct,
                hot_water: e.summer_hot_water_pct,
                cold_water: e.summer_cold_water_pct,
            },
        }
    }
}
