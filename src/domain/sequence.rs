//! Ordered operation sequences.
//!
//! A sequence is evaluated in declared order at every step; nothing is
//! reordered and dependencies are not inferred. Operations reading another
//! operation's current-step output must be listed after it.

use crate::domain::error::SeqtraderError;
use crate::domain::handle::{ColumnKey, SeriesHandle};
use crate::domain::operation::Operation;
use crate::domain::table::Table;
use std::collections::HashSet;
use std::ops::Add;

#[derive(Debug, Clone, Default)]
pub struct OpSequence {
    ops: Vec<Operation>,
}

impl OpSequence {
    pub fn new(ops: Vec<Operation>) -> Self {
        Self { ops }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.ops.iter()
    }

    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// Append `other` after every operation of `self`.
    pub fn concat(mut self, other: OpSequence) -> Self {
        self.ops.extend(other.ops);
        self
    }

    /// Every handle written by the sequence, in first-write order.
    pub fn outputs(&self) -> Vec<&SeriesHandle> {
        let mut seen = HashSet::new();
        self.ops
            .iter()
            .map(Operation::output)
            .filter(|h| seen.insert(h.key()))
            .collect()
    }

    /// Every handle read or written by the sequence.
    pub fn handles(&self) -> impl Iterator<Item = &SeriesHandle> {
        self.ops
            .iter()
            .flat_map(|op| op.inputs().chain(std::iter::once(op.output())))
    }

    pub fn evaluate_step(&self, table: &mut Table, step: usize) -> Result<(), SeqtraderError> {
        for op in &self.ops {
            op.evaluate(table, step)?;
        }
        Ok(())
    }

    /// Static ordering check.
    ///
    /// Every input must be a column in `known` (seeded raw data, or written
    /// by a sequence evaluated earlier), written by an earlier operation of
    /// this sequence, or the reading operation's own output. On success the
    /// sequence's outputs are added to `known`.
    pub fn check_order(&self, known: &mut HashSet<ColumnKey>) -> Result<(), SeqtraderError> {
        for (index, op) in self.ops.iter().enumerate() {
            for input in op.inputs() {
                if input.key() != op.output().key() && !known.contains(input.key()) {
                    return Err(SeqtraderError::OrderViolation {
                        index,
                        output: op.output().name(),
                        input: input.name(),
                    });
                }
            }
            known.insert(op.output().key().clone());
        }
        Ok(())
    }
}

impl From<Vec<Operation>> for OpSequence {
    fn from(ops: Vec<Operation>) -> Self {
        Self::new(ops)
    }
}

impl FromIterator<Operation> for OpSequence {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Add for OpSequence {
    type Output = OpSequence;

    fn add(self, rhs: OpSequence) -> OpSequence {
        self.concat(rhs)
    }
}

impl Extend<Operation> for OpSequence {
    fn extend<I: IntoIterator<Item = Operation>>(&mut self, iter: I) {
        self.ops.extend(iter);
    }
}

impl IntoIterator for OpSequence {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}
