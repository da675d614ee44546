use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::initiative::{FIRST_MONTH, LAST_MONTH};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A (quarter, year) pair: the unit the roadmap board shows at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub quarter: u8,
    pub year: i32,
}

impl Period {
    #[must_use]
    pub const fn new(quarter: u8, year: i32) -> Self {
        Self { quarter, year }
    }

    /// The period containing `now`.
    #[must_use]
    pub fn containing(now: DateTime<Utc>) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let quarter = (now.month0() / 3 + 1) as u8;
        Self::new(quarter, now.year())
    }

    /// Name of a quarter-relative month (1-3), or `None` when either the
    /// quarter or the month is out of range.
    #[must_use]
    pub fn month_name(self, month: u8) -> Option<&'static str> {
        if !(1..=4).contains(&self.quarter) || !(FIRST_MONTH..=LAST_MONTH).contains(&month) {
            return None;
        }
        let index = usize::from(self.quarter - 1) * 3 + usize::from(month - 1);
        MONTH_NAMES.get(index).copied()
    }

    /// The three month names of this quarter.
    #[must_use]
    pub fn month_names(self) -> Option<[&'static str; 3]> {
        Some([
            self.month_name(1)?,
            self.month_name(2)?,
            self.month_name(3)?,
        ])
    }

    /// Next quarter within the same year; the board does not roll over.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        if self.quarter < 4 {
            Some(Self::new(self.quarter + 1, self.year))
        } else {
            None
        }
    }

    /// Previous quarter within the same year.
    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        if self.quarter > 1 {
            Some(Self::new(self.quarter - 1, self.year))
        } else {
            None
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{} {}", self.quarter, self.year)
    }
}
