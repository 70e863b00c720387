//! Column-oriented, time-indexed result table.
//!
//! All columns share one timestamp index. Raw columns are seeded in full
//! before a run and never written; derived columns grow by one slot per
//! processed step.

use crate::domain::error::SeqtraderError;
use crate::domain::handle::{ColumnKey, SeriesHandle};
use crate::domain::lookback::LookbackView;
use crate::domain::value::Value;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub key: ColumnKey,
    pub first_value: Option<Value>,
    pub raw: bool,
    cells: Vec<Option<Value>>,
}

impl Column {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell values, unset slots reported as `Missing`.
    pub fn values(&self) -> Vec<Value> {
        self.cells
            .iter()
            .map(|c| c.unwrap_or(Value::Missing))
            .collect()
    }

    pub fn values_f64(&self) -> Result<Vec<f64>, SeqtraderError> {
        self.values().iter().map(Value::as_f64).collect()
    }

    pub fn get(&self, row: usize) -> Option<Value> {
        self.cells.get(row).copied().flatten()
    }

    pub fn last(&self) -> Option<Value> {
        self.cells.last().copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    index: Vec<NaiveDate>,
    columns: Vec<Column>,
    positions: HashMap<ColumnKey, usize>,
}

impl Table {
    /// Create a table over `index` with the time column already seeded.
    pub fn new(index: Vec<NaiveDate>) -> Self {
        let time = Column {
            key: SeriesHandle::time().key().clone(),
            first_value: None,
            raw: true,
            cells: index.iter().map(|d| Some(Value::Date(*d))).collect(),
        };
        let mut positions = HashMap::new();
        positions.insert(time.key.clone(), 0);
        Self {
            index,
            columns: vec![time],
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &[NaiveDate] {
        &self.index
    }

    pub fn date(&self, step: usize) -> Option<NaiveDate> {
        self.index.get(step).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn contains(&self, key: &ColumnKey) -> bool {
        self.positions.contains_key(key)
    }

    /// Seed a full-length raw column.
    pub fn insert_raw(
        &mut self,
        handle: &SeriesHandle,
        values: Vec<Value>,
    ) -> Result<(), SeqtraderError> {
        if values.len() != self.index.len() {
            return Err(SeqtraderError::MisalignedIndex {
                code: handle.name(),
                reason: format!(
                    "{} values for an index of {} timestamps",
                    values.len(),
                    self.index.len()
                ),
            });
        }
        let column = Column {
            key: handle.key().clone(),
            first_value: handle.first_value(),
            raw: true,
            cells: values.into_iter().map(Some).collect(),
        };
        match self.positions.get(handle.key()) {
            Some(&pos) => self.columns[pos] = column,
            None => {
                self.positions.insert(column.key.clone(), self.columns.len());
                self.columns.push(column);
            }
        }
        Ok(())
    }

    /// Register a derived column, merging `first_value` declarations.
    ///
    /// Declaring an existing column is a no-op unless the handles disagree
    /// on the first value.
    pub fn declare(&mut self, handle: &SeriesHandle) -> Result<(), SeqtraderError> {
        if let Some(&pos) = self.positions.get(handle.key()) {
            let column = &mut self.columns[pos];
            match (column.first_value, handle.first_value()) {
                (Some(a), Some(b)) if a != b => {
                    return Err(SeqtraderError::ConflictingFirstValue {
                        name: handle.name(),
                        first: a.to_string(),
                        second: b.to_string(),
                    });
                }
                (None, Some(b)) => column.first_value = Some(b),
                _ => {}
            }
            return Ok(());
        }
        self.positions
            .insert(handle.key().clone(), self.columns.len());
        self.columns.push(Column {
            key: handle.key().clone(),
            first_value: handle.first_value(),
            raw: false,
            cells: Vec::with_capacity(self.index.len()),
        });
        Ok(())
    }

    /// Whether `key` is full-length input data that no run may write.
    pub fn is_seeded(&self, key: &ColumnKey) -> bool {
        self.positions
            .get(key)
            .is_some_and(|&pos| self.columns[pos].raw)
    }

    /// Mark completed derived columns outside `writable` as seeded input.
    ///
    /// Lets a finished table from one run feed the next one.
    pub fn seal_completed(&mut self, writable: &HashSet<ColumnKey>) {
        let steps = self.index.len();
        for column in self.columns.iter_mut() {
            if !column.raw && column.cells.len() == steps && !writable.contains(&column.key) {
                column.raw = true;
            }
        }
    }

    /// Drop the values of the given derived columns, keeping declarations.
    pub fn clear(&mut self, keys: &HashSet<ColumnKey>) {
        for column in self.columns.iter_mut() {
            if !column.raw && keys.contains(&column.key) {
                column.cells.clear();
            }
        }
    }

    /// Write the value of `handle` for `step`.
    ///
    /// The first write of a step appends the step's slot; later writes in
    /// the same step replace it. Earlier steps are frozen.
    pub fn write(
        &mut self,
        handle: &SeriesHandle,
        step: usize,
        value: Value,
    ) -> Result<(), SeqtraderError> {
        if !self.positions.contains_key(handle.key()) {
            self.declare(handle)?;
        }
        let pos = self.positions[handle.key()];
        let column = &mut self.columns[pos];
        if column.raw {
            return Err(SeqtraderError::ReadOnlyColumn {
                name: handle.name(),
            });
        }
        if column.cells.len() > step + 1 {
            return Err(SeqtraderError::ReadOnlyColumn {
                name: format!("{} (step {} is frozen)", handle.name(), step),
            });
        }
        if column.cells.len() == step + 1 {
            column.cells[step] = Some(value);
        } else {
            column.cells.resize(step, None);
            column.cells.push(Some(value));
        }
        Ok(())
    }

    /// Lookback view of `handle` at `step`.
    ///
    /// The handle's own `first_value` wins over the one recorded on the column.
    pub fn view<'a>(
        &'a self,
        handle: &SeriesHandle,
        step: usize,
    ) -> Result<LookbackView<'a>, SeqtraderError> {
        let column = self.column(handle)?;
        let first_value = handle.first_value().or(column.first_value);
        Ok(LookbackView::new(&column.key, step, first_value, &column.cells))
    }

    pub fn column(&self, handle: &SeriesHandle) -> Result<&Column, SeqtraderError> {
        self.positions
            .get(handle.key())
            .map(|&pos| &self.columns[pos])
            .ok_or_else(|| SeqtraderError::UnknownColumn {
                name: handle.name(),
            })
    }

    /// Look a column up by its flat `group.field` label.
    pub fn column_by_name(&self, name: &str) -> Result<&Column, SeqtraderError> {
        self.columns
            .iter()
            .find(|c| c.key.name() == name)
            .ok_or_else(|| SeqtraderError::UnknownColumn {
                name: name.to_string(),
            })
    }

    pub fn last(&self, handle: &SeriesHandle) -> Result<Value, SeqtraderError> {
        Ok(self.column(handle)?.last().unwrap_or(Value::Missing))
    }

    pub fn values_f64(&self, handle: &SeriesHandle) -> Result<Vec<f64>, SeqtraderError> {
        self.column(handle)?.values_f64()
    }

    /// Derived columns whose length does not match `steps`.
    pub fn incomplete_columns(&self, steps: usize) -> Vec<&ColumnKey> {
        self.columns
            .iter()
            .filter(|c| !c.raw && !c.cells.is_empty() && c.cells.len() != steps)
            .map(|c| &c.key)
            .collect()
    }

    /// Flat export header: `date`, then `group.field` per column.
    pub fn headers(&self) -> Vec<String> {
        std::iter::once("date".to_string())
            .chain(
                self.columns
                    .iter()
                    .filter(|c| !c.key.is_time())
                    .map(|c| c.key.name()),
            )
            .collect()
    }

    /// Flat export rows for `start..end`, aligned with [`Table::headers`].
    pub fn rows(&self, start: usize, end: usize) -> Vec<Vec<String>> {
        let end = end.min(self.index.len());
        (start.min(end)..end)
            .map(|row| {
                std::iter::once(self.index[row].format("%Y-%m-%d").to_string())
                    .chain(
                        self.columns
                            .iter()
                            .filter(|c| !c.key.is_time())
                            .map(|c| c.get(row).map(|v| v.to_string()).unwrap_or_default()),
                    )
                    .collect()
            })
            .collect()
    }

    /// The last `n` rows, for debug display.
    pub fn tail(&self, n: usize) -> Vec<Vec<String>> {
        let len = self.index.len();
        self.rows(len.saturating_sub(n), len)
    }
}
