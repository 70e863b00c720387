//! Result export port.

use crate::domain::error::SeqtraderError;
use crate::domain::metrics::StrategySummary;
use crate::domain::table::Table;
use std::path::Path;

/// Writes a completed run somewhere persistent.
pub trait ReportPort {
    fn write(&self, table: &Table, output_path: &Path) -> Result<(), SeqtraderError>;

    /// Default implementation: writes the table only.
    fn write_with_summaries(
        &self,
        table: &Table,
        summaries: &[StrategySummary],
        output_path: &Path,
    ) -> Result<(), SeqtraderError> {
        let _ = summaries;
        self.write(table, output_path)
    }
}
