use std::fmt;

use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MeterType {
    Heating,
    HotWater,
    ColdWater,
}

impl MeterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Heating => "heating",
            Self::HotWater => "hot_water",
            Self::ColdWater => "cold_water",
        }
    }
}

impl fmt::Display for MeterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown meter type '{0}'")]
pub struct ParseMeterTypeError(pub String);

impl TryFrom<String> for MeterType {
    type Error = ParseMeterTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for MeterType {
    type Err = ParseMeterTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "heating" => Ok(Self::Heating),
            "hot_water" => Ok(Self::HotWater),
            "cold_water" => Ok(Self::ColdWater),
            other => Err(ParseMeterTypeError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Meter {
    pub id: i64,
    pub unit_id: i64,
    #[sqlx(try_from = "String")]
    pub meter_type: MeterType,
    pub code: String,
}

/// A single index value read off a meter on a given day.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    pub id: i64,
    pub meter_id: i64,
    pub reading_date: Date,
    pub value: f64,
}
