//! Market data access port.

use crate::domain::error::SeqtraderError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily bars for one instrument within `[start_date, end_date]`, oldest first.
    fn fetch_ohlcv(
        &self,
        code: &str,
        exchange: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, SeqtraderError>;

    fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, SeqtraderError>;

    /// First date, last date and bar count, or `None` when the instrument has no data.
    fn get_data_range(
        &self,
        code: &str,
        exchange: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SeqtraderError>;
}
