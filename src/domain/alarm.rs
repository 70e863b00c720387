//! Periodic schedules.
//!
//! An alarm holds no state: whether it fires is derived from the previous
//! and current timestamps alone. It fires on the first timestamp of each
//! calendar period, including the very first timestamp of the data.

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Alarm {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Alarm {
    /// Calendar period containing `date`; two dates share a period iff equal.
    fn period_of(&self, date: NaiveDate) -> (i32, u32) {
        match self {
            Alarm::Daily => (date.year(), date.ordinal()),
            Alarm::Weekly => {
                let week = date.iso_week();
                (week.year(), week.week())
            }
            Alarm::Monthly => (date.year(), date.month()),
            Alarm::Quarterly => (date.year(), (date.month() - 1) / 3),
            Alarm::Yearly => (date.year(), 0),
        }
    }

    pub fn is_triggered(&self, prev: Option<NaiveDate>, current: NaiveDate) -> bool {
        match prev {
            None => true,
            Some(prev) => self.period_of(prev) != self.period_of(current),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Alarm::Daily => "daily",
            Alarm::Weekly => "weekly",
            Alarm::Monthly => "monthly",
            Alarm::Quarterly => "quarterly",
            Alarm::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alarm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Alarm::Daily),
            "weekly" => Ok(Alarm::Weekly),
            "monthly" => Ok(Alarm::Monthly),
            "quarterly" => Ok(Alarm::Quarterly),
            "yearly" | "annually" => Ok(Alarm::Yearly),
            other => Err(format!("unknown alarm schedule '{}'", other)),
        }
    }
}
