//! OHLCV bar representation.

use chrono::NaiveDate;

pub const OHLCV_FIELDS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub exchange: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// Value of one of [`OHLCV_FIELDS`].
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            "Open" => Some(self.open),
            "High" => Some(self.high),
            "Low" => Some(self.low),
            "Close" => Some(self.close),
            "Volume" => Some(self.volume as f64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> OhlcvBar {
        OhlcvBar {
            code: "SPX".into(),
            exchange: "US".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000,
        }
    }

    #[test]
    fn field_lookup() {
        let bar = sample_bar();
        assert_eq!(bar.field("Open"), Some(100.0));
        assert_eq!(bar.field("High"), Some(110.0));
        assert_eq!(bar.field("Low"), Some(90.0));
        assert_eq!(bar.field("Close"), Some(105.0));
        assert_eq!(bar.field("Volume"), Some(50_000.0));
        assert_eq!(bar.field("Adj Close"), None);
    }

    #[test]
    fn every_listed_field_resolves() {
        let bar = sample_bar();
        assert!(OHLCV_FIELDS.iter().all(|f| bar.field(f).is_some()));
    }
}
