//! CSV file data adapter.
//!
//! Each instrument lives in `<data_dir>/<CODE>_<EXCHANGE>.csv` with a header
//! row naming `date,open,high,low,close,volume` in any order.

use crate::domain::error::SeqtraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use csv::StringRecord;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// Positions of [`COLUMNS`] within a file's header row.
struct ColumnMap([usize; 6]);

impl ColumnMap {
    fn from_headers(headers: &StringRecord, path: &Path) -> Result<Self, SeqtraderError> {
        let mut positions = [0usize; 6];
        for (slot, name) in positions.iter_mut().zip(COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| SeqtraderError::Database {
                    reason: format!("{}: missing '{}' column", path.display(), name),
                })?;
        }
        Ok(Self(positions))
    }

    fn text<'r>(&self, record: &'r StringRecord, column: usize) -> Result<&'r str, SeqtraderError> {
        record
            .get(self.0[column])
            .map(str::trim)
            .ok_or_else(|| SeqtraderError::Database {
                reason: format!("line {}: missing {} value", line_of(record), COLUMNS[column]),
            })
    }

    fn date(&self, record: &StringRecord) -> Result<NaiveDate, SeqtraderError> {
        let raw = self.text(record, 0)?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| SeqtraderError::Database {
            reason: format!("line {}: invalid date '{}': {}", line_of(record), raw, e),
        })
    }

    fn number(&self, record: &StringRecord, column: usize) -> Result<f64, SeqtraderError> {
        let raw = self.text(record, column)?;
        raw.parse::<f64>().map_err(|e| SeqtraderError::Database {
            reason: format!(
                "line {}: invalid {} value '{}': {}",
                line_of(record),
                COLUMNS[column],
                raw,
                e
            ),
        })
    }
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str, exchange: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", code, exchange))
    }

    /// All bars in the file, sorted by date.
    fn read_bars(&self, code: &str, exchange: &str) -> Result<Vec<OhlcvBar>, SeqtraderError> {
        let path = self.csv_path(code, exchange);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SeqtraderError::NoData {
                    code: code.to_string(),
                    exchange: exchange.to_string(),
                })
            }
            Err(e) => return Err(SeqtraderError::Io(e)),
        };

        let mut rdr = csv::Reader::from_reader(file);
        let headers = rdr.headers().map_err(|e| SeqtraderError::Database {
            reason: format!("{}: {}", path.display(), e),
        })?;
        let columns = ColumnMap::from_headers(headers, &path)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| SeqtraderError::Database {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            bars.push(OhlcvBar {
                code: code.to_string(),
                exchange: exchange.to_string(),
                date: columns.date(&record)?,
                open: columns.number(&record, 1)?,
                high: columns.number(&record, 2)?,
                low: columns.number(&record, 3)?,
                close: columns.number(&record, 4)?,
                volume: columns.number(&record, 5)?.round() as i64,
            });
        }

        bars.sort_by_key(|b| b.date);
        debug!(path = %path.display(), bars = bars.len(), "read csv");
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        exchange: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, SeqtraderError> {
        let mut bars = self.read_bars(code, exchange)?;
        bars.retain(|b| b.date >= start_date && b.date <= end_date);
        Ok(bars)
    }

    fn list_symbols(&self, exchange: &str) -> Result<Vec<String>, SeqtraderError> {
        let suffix = format!("_{}.csv", exchange);
        let mut symbols = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            if let Some(code) = name.to_string_lossy().strip_suffix(&suffix) {
                if !code.is_empty() {
                    symbols.push(code.to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        code: &str,
        exchange: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, SeqtraderError> {
        let bars = match self.read_bars(code, exchange) {
            Ok(bars) => bars,
            Err(SeqtraderError::NoData { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup_test_data() -> TempDir {
        let dir = TempDir::new().unwrap();
        let path = dir.path();

        let csv_content = "date,open,high,low,close,volume\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n";

        fs::write(path.join("SPX_US.csv"), csv_content).unwrap();
        fs::write(path.join("QQQ_US.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("BHP_ASX.csv"), "date,open,high,low,close,volume\n").unwrap();
        fs::write(path.join("notes.txt"), "not market data").unwrap();

        dir
    }

    fn adapter(dir: &TempDir) -> CsvAdapter {
        CsvAdapter::new(dir.path().to_path_buf())
    }

    #[test]
    fn fetch_ohlcv_returns_sorted_bars() {
        let dir = setup_test_data();
        let bars = adapter(&dir)
            .fetch_ohlcv("SPX", "US", d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, d(2024, 1, 15));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000);
        assert_eq!(bars[0].code, "SPX");
        assert_eq!(bars[2].date, d(2024, 1, 17));
    }

    #[test]
    fn fetch_ohlcv_filters_by_date() {
        let dir = setup_test_data();
        let bars = adapter(&dir)
            .fetch_ohlcv("SPX", "US", d(2024, 1, 16), d(2024, 1, 16))
            .unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, 110.0);
    }

    #[test]
    fn header_order_does_not_matter() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("X_US.csv"),
            "Close,Date,Volume,Open,High,Low\n12.5,2024-02-01,10.0,12,13,11\n",
        )
        .unwrap();
        let bars = adapter(&dir)
            .fetch_ohlcv("X", "US", d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        assert_eq!(bars[0].close, 12.5);
        assert_eq!(bars[0].low, 11.0);
        assert_eq!(bars[0].volume, 10);
    }

    #[test]
    fn missing_file_is_no_data() {
        let dir = setup_test_data();
        let err = adapter(&dir)
            .fetch_ohlcv("XYZ", "US", d(2024, 1, 1), d(2024, 1, 31))
            .unwrap_err();
        assert!(matches!(err, SeqtraderError::NoData { .. }));
    }

    #[test]
    fn missing_column_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("X_US.csv"), "date,open,high,low,close\n").unwrap();
        let err = adapter(&dir)
            .fetch_ohlcv("X", "US", d(2024, 1, 1), d(2024, 1, 31))
            .unwrap_err();
        assert!(err.to_string().contains("volume"));
    }

    #[test]
    fn bad_number_names_the_line() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("X_US.csv"),
            "date,open,high,low,close,volume\n2024-01-02,1,1,1,oops,5\n",
        )
        .unwrap();
        let err = adapter(&dir)
            .fetch_ohlcv("X", "US", d(2024, 1, 1), d(2024, 1, 31))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 2"));
        assert!(msg.contains("close"));
    }

    #[test]
    fn list_symbols_returns_exchange_symbols() {
        let dir = setup_test_data();
        let adapter = adapter(&dir);
        assert_eq!(adapter.list_symbols("US").unwrap(), vec!["QQQ", "SPX"]);
        assert_eq!(adapter.list_symbols("ASX").unwrap(), vec!["BHP"]);
        assert!(adapter.list_symbols("LSE").unwrap().is_empty());
    }

    #[test]
    fn list_symbols_missing_dir_is_io_error() {
        let adapter = CsvAdapter::new(PathBuf::from("/nonexistent/seqtrader/data"));
        assert!(matches!(adapter.list_symbols("US"), Err(SeqtraderError::Io(_))));
    }

    #[test]
    fn data_range_reports_span_and_count() {
        let dir = setup_test_data();
        let adapter = adapter(&dir);
        assert_eq!(
            adapter.get_data_range("SPX", "US").unwrap(),
            Some((d(2024, 1, 15), d(2024, 1, 17), 3))
        );
        assert_eq!(adapter.get_data_range("QQQ", "US").unwrap(), None);
        assert_eq!(adapter.get_data_range("NOPE", "US").unwrap(), None);
    }
}
