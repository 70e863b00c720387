//! CSV export of a completed run.
//!
//! The table is flattened to one row per timestamp with a `date` column
//! followed by one `group.field` column per series. Summaries, when given,
//! go to a sibling `<stem>_summary.csv`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::SeqtraderError;
use crate::domain::metrics::StrategySummary;
use crate::domain::table::Table;
use crate::ports::report_port::ReportPort;
use tracing::info;

#[derive(Debug, Default)]
pub struct CsvTableReport;

impl CsvTableReport {
    pub fn new() -> Self {
        Self
    }

    pub fn summary_path(output_path: &Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        output_path.with_file_name(format!("{}_summary.csv", stem))
    }
}

fn csv_error(path: &Path, e: csv::Error) -> SeqtraderError {
    SeqtraderError::Io(std::io::Error::other(format!("{}: {}", path.display(), e)))
}

fn ensure_parent(path: &Path) -> Result<(), SeqtraderError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

impl ReportPort for CsvTableReport {
    fn write(&self, table: &Table, output_path: &Path) -> Result<(), SeqtraderError> {
        ensure_parent(output_path)?;
        let mut wtr = csv::Writer::from_path(output_path).map_err(|e| csv_error(output_path, e))?;
        wtr.write_record(table.headers())
            .map_err(|e| csv_error(output_path, e))?;
        for row in table.rows(0, table.len()) {
            wtr.write_record(&row).map_err(|e| csv_error(output_path, e))?;
        }
        wtr.flush()?;
        info!(path = %output_path.display(), rows = table.len(), "wrote table");
        Ok(())
    }

    fn write_with_summaries(
        &self,
        table: &Table,
        summaries: &[StrategySummary],
        output_path: &Path,
    ) -> Result<(), SeqtraderError> {
        self.write(table, output_path)?;

        let path = Self::summary_path(output_path);
        let mut wtr = csv::Writer::from_path(&path).map_err(|e| csv_error(&path, e))?;
        wtr.write_record([
            "strategy",
            "final_total",
            "invested",
            "gain",
            "gain_pct",
            "max_drawdown_pct",
            "max_drawdown_steps",
        ])
        .map_err(|e| csv_error(&path, e))?;
        for s in summaries {
            wtr.write_record([
                s.name.clone(),
                format!("{:.2}", s.final_total),
                format!("{:.2}", s.invested),
                format!("{:.2}", s.gain),
                format!("{:.2}", s.gain_pct),
                format!("{:.2}", s.max_drawdown * 100.0),
                s.max_drawdown_duration.to_string(),
            ])
            .map_err(|e| csv_error(&path, e))?;
        }
        wtr.flush()?;
        info!(path = %path.display(), strategies = summaries.len(), "wrote summary");
        Ok(())
    }
}
