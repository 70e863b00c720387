//! Raw market data and table seeding.
//!
//! All instruments must share one ordered, duplicate-free date index. The
//! data is never re-sorted or re-aligned here: a mismatch is a setup error.

use crate::domain::error::SeqtraderError;
use crate::domain::handle::SeriesHandle;
use crate::domain::ohlcv::{OhlcvBar, OHLCV_FIELDS};
use crate::domain::table::Table;
use crate::domain::value::Value;
use chrono::NaiveDate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct MarketData {
    instruments: BTreeMap<String, Vec<OhlcvBar>>,
}

impl MarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instrument(mut self, ticker: &str, bars: Vec<OhlcvBar>) -> Self {
        self.insert(ticker, bars);
        self
    }

    pub fn insert(&mut self, ticker: &str, bars: Vec<OhlcvBar>) {
        self.instruments.insert(ticker.to_string(), bars);
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }

    pub fn bars(&self, ticker: &str) -> Option<&[OhlcvBar]> {
        self.instruments.get(ticker).map(Vec::as_slice)
    }

    /// Handle of one raw field, e.g. `handle("SPX", "Close")`.
    pub fn handle(ticker: &str, field: &str) -> SeriesHandle {
        SeriesHandle::new(ticker, field)
    }

    /// The shared date index, validated across all instruments.
    pub fn index(&self) -> Result<Vec<NaiveDate>, SeqtraderError> {
        let (first_ticker, first_bars) =
            self.instruments
                .iter()
                .next()
                .ok_or_else(|| SeqtraderError::NoData {
                    code: "<none>".into(),
                    exchange: String::new(),
                })?;
        let expected: Vec<NaiveDate> = first_bars.iter().map(|b| b.date).collect();

        for (ticker, bars) in &self.instruments {
            if bars.is_empty() {
                return Err(SeqtraderError::NoData {
                    code: ticker.clone(),
                    exchange: String::new(),
                });
            }
            let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
            if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
                return Err(SeqtraderError::MisalignedIndex {
                    code: ticker.clone(),
                    reason: format!("dates not strictly increasing at {} -> {}", pair[0], pair[1]),
                });
            }
            if dates != expected {
                return Err(SeqtraderError::MisalignedIndex {
                    code: ticker.clone(),
                    reason: format!("date index differs from {}", first_ticker),
                });
            }
        }
        Ok(expected)
    }

    /// Seed a table with `(ticker, field)` columns for every OHLCV field.
    pub fn into_table(self) -> Result<Table, SeqtraderError> {
        let index = self.index()?;
        let mut table = Table::new(index);
        for (ticker, bars) in &self.instruments {
            for field in OHLCV_FIELDS {
                let values = bars
                    .iter()
                    .map(|b| b.field(field).map(Value::Num).unwrap_or(Value::Missing))
                    .collect();
                table.insert_raw(&Self::handle(ticker, field), values)?;
            }
        }
        Ok(table)
    }
}
