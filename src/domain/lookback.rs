//! Read-only relative-indexed views over a column's history.
//!
//! # Indexing
//!
//! At step `i` a view spans the handle's virtual `first_value` slot (when
//! present) followed by the column's slots `0..=i`. Slot `i` belongs to the
//! current step and stays unset until an operation writes it.
//!
//! - `get(-1)`: current step
//! - `get(-2)`: previous step, or `first_value` at step 0
//! - `get(0)`: oldest slot of the view
//!
//! Reading past either end fails with [`SeqtraderError::Lookback`]; reading
//! an unset slot fails with [`SeqtraderError::UnsetValue`].

use crate::domain::error::SeqtraderError;
use crate::domain::handle::ColumnKey;
use crate::domain::value::Value;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy)]
pub struct LookbackView<'a> {
    key: &'a ColumnKey,
    step: usize,
    first_value: Option<Value>,
    cells: &'a [Option<Value>],
}

impl<'a> LookbackView<'a> {
    /// `cells` may be shorter than `step + 1`; missing slots read as unset.
    pub fn new(
        key: &'a ColumnKey,
        step: usize,
        first_value: Option<Value>,
        cells: &'a [Option<Value>],
    ) -> Self {
        let visible = cells.len().min(step + 1);
        Self {
            key,
            step,
            first_value,
            cells: &cells[..visible],
        }
    }

    pub fn key(&self) -> &ColumnKey {
        self.key
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Number of slots, including the virtual first-value slot.
    pub fn len(&self) -> usize {
        self.step + 1 + usize::from(self.first_value.is_some())
    }

    /// Always false: a view holds at least the current step's slot.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn has_first_value(&self) -> bool {
        self.first_value.is_some()
    }

    pub fn get(&self, offset: isize) -> Result<Value, SeqtraderError> {
        let len = self.len() as isize;
        let pos = if offset < 0 { len + offset } else { offset };
        if pos < 0 || pos >= len {
            return Err(SeqtraderError::Lookback {
                handle: self.key.name(),
                step: self.step,
                offset,
                available: self.len(),
            });
        }

        let slot = match self.first_value {
            Some(fv) if pos == 0 => return Ok(fv),
            Some(_) => (pos - 1) as usize,
            None => pos as usize,
        };
        self.cells
            .get(slot)
            .copied()
            .flatten()
            .ok_or_else(|| SeqtraderError::UnsetValue {
                handle: self.key.name(),
                step: slot,
            })
    }

    pub fn last(&self) -> Result<Value, SeqtraderError> {
        self.get(-1)
    }

    pub fn prev(&self) -> Result<Value, SeqtraderError> {
        self.get(-2)
    }

    pub fn f64_at(&self, offset: isize) -> Result<f64, SeqtraderError> {
        self.get(offset)?.as_f64()
    }

    pub fn bool_at(&self, offset: isize) -> Result<bool, SeqtraderError> {
        Ok(self.get(offset)?.truthy())
    }

    pub fn date_at(&self, offset: isize) -> Result<NaiveDate, SeqtraderError> {
        self.get(offset)?.as_date()
    }
}
