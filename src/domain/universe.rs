//! Instrument universe: code lists and loading them into [`MarketData`].
//!
//! Unlike a screener, a backtest here needs every configured instrument.
//! Any code that cannot be fetched aborts setup before the engine is built.

use crate::domain::error::SeqtraderError;
use crate::domain::market_data::MarketData;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::info;

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum UniverseError {
    #[error("empty token in list")]
    EmptyToken,

    #[error("duplicate entry: {0}")]
    Duplicate(String),
}

/// Split a comma-separated list, trimming entries and rejecting empties and duplicates.
pub fn parse_list(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut items = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(UniverseError::Duplicate(trimmed.to_string()));
        }
        items.push(trimmed.to_string());
    }

    Ok(items)
}

/// Instrument codes are case-insensitive and stored upper-case.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    parse_list(&input.to_uppercase())
}

/// Fetch every code and validate that they share one date index.
pub fn load_universe(
    data_port: &dyn DataPort,
    codes: &[String],
    exchange: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<MarketData, SeqtraderError> {
    let mut data = MarketData::new();
    for code in codes {
        let bars = data_port.fetch_ohlcv(code, exchange, start_date, end_date)?;
        if bars.is_empty() {
            return Err(SeqtraderError::NoData {
                code: code.clone(),
                exchange: exchange.to_string(),
            });
        }
        info!(code = %code, exchange, bars = bars.len(), "loaded market data");
        data.insert(code, bars);
    }
    data.index()?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::OhlcvBar;

    struct FixedPort {
        bars: Vec<OhlcvBar>,
    }

    impl DataPort for FixedPort {
        fn fetch_ohlcv(
            &self,
            code: &str,
            exchange: &str,
            start_date: NaiveDate,
            end_date: NaiveDate,
        ) -> Result<Vec<OhlcvBar>, SeqtraderError> {
            if code == "MISSING" {
                return Err(SeqtraderError::NoData {
                    code: code.into(),
                    exchange: exchange.into(),
                });
            }
            Ok(self
                .bars
                .iter()
                .filter(|b| b.date >= start_date && b.date <= end_date)
                .map(|b| OhlcvBar {
                    code: code.to_string(),
                    ..b.clone()
                })
                .collect())
        }

        fn list_symbols(&self, _exchange: &str) -> Result<Vec<String>, SeqtraderError> {
            Ok(vec![])
        }

        fn get_data_range(
            &self,
            _code: &str,
            _exchange: &str,
        ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SeqtraderError> {
            Ok(None)
        }
    }

    fn port() -> FixedPort {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        FixedPort {
            bars: (0..5)
                .map(|i| OhlcvBar {
                    code: String::new(),
                    exchange: "US".into(),
                    date: start + chrono::Duration::days(i),
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 10,
                })
                .collect(),
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parse_list_basic() {
        assert_eq!(
            parse_list(" saving, avg ,cross").unwrap(),
            vec!["saving", "avg", "cross"]
        );
    }

    #[test]
    fn parse_codes_uppercases() {
        assert_eq!(parse_codes("spx,qqq").unwrap(), vec!["SPX", "QQQ"]);
    }

    #[test]
    fn parse_list_empty_token() {
        assert_eq!(parse_list("a,,b"), Err(UniverseError::EmptyToken));
    }

    #[test]
    fn parse_codes_duplicate_after_case_folding() {
        assert_eq!(
            parse_codes("spx,SPX"),
            Err(UniverseError::Duplicate("SPX".into()))
        );
    }

    #[test]
    fn load_universe_seeds_all_codes() {
        let codes = vec!["AAA".to_string(), "BBB".to_string()];
        let data = load_universe(&port(), &codes, "US", d("2024-01-02"), d("2024-01-04")).unwrap();
        assert_eq!(data.tickers().collect::<Vec<_>>(), vec!["AAA", "BBB"]);
        assert_eq!(data.index().unwrap().len(), 3);
    }

    #[test]
    fn load_universe_fails_fast_on_missing_code() {
        let codes = vec!["AAA".to_string(), "MISSING".to_string()];
        let err = load_universe(&port(), &codes, "US", d("2024-01-01"), d("2024-01-05")).unwrap_err();
        assert!(matches!(err, SeqtraderError::NoData { .. }));
    }

    #[test]
    fn load_universe_rejects_empty_range() {
        let codes = vec!["AAA".to_string()];
        let err = load_universe(&port(), &codes, "US", d("2025-01-01"), d("2025-02-01")).unwrap_err();
        assert!(matches!(err, SeqtraderError::NoData { .. }));
    }
}
