use std::fmt;

use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BillType {
    Gas,
    Electricity,
}

impl BillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gas => "gas",
            Self::Electricity => "electricity",
        }
    }
}

impl fmt::Display for BillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unknown bill type '{0}'")]
pub struct ParseBillTypeError(pub String);

impl TryFrom<String> for BillType {
    type Error = ParseBillTypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl std::str::FromStr for BillType {
    type Err = ParseBillTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "gas" => Ok(Self::Gas),
            "electricity" => Ok(Self::Electricity),
            other => Err(ParseBillTypeError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bill {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub bill_type: BillType,
    pub amount: f64,
    pub bill_date: Date,
}
