use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Summer,
    Winter,
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summer => f.write_str("summer"),
            Self::Winter => f.write_str("winter"),
        }
    }
}

/// Summer iff `summer_start <= month <= summer_end`.
///
/// The range is inclusive and never wraps around December: a configuration
/// with `summer_start > summer_end` is rejected when settings are parsed.
pub fn resolve_season(month: u8, summer_start: u8, summer_end: u8) -> Season {
    if (summer_start..=summer_end).contains(&month) {
        Season::Summer
    } else {
        Season::Winter
    }
}

/// Middle day of `[from, to]`, rounded down.
///
/// A whole period takes the season of this day's month, even when it
/// straddles a season boundary.
pub fn period_midpoint(from: Date, to: Date) -> Date {
    let half = (to - from).whole_days().div_euclid(2);
    from.checked_add(Duration::days(half)).unwrap_or(to)
}

/// Calendar month (1..=12) of the period midpoint.
pub fn midpoint_month(from: Date, to: Date) -> u8 {
    u8::from(period_midpoint(from, to).month())
}
