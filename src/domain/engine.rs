//! Backtest engine: a single forward pass over the time index.
//!
//! For every step the engine evaluates each sequence in the order supplied,
//! and each operation in declared order. Once a step completes its values
//! are frozen. The first failing operation aborts the run; whatever was
//! written stays in the table for inspection but the run is marked failed.

use crate::domain::error::SeqtraderError;
use crate::domain::handle::ColumnKey;
use crate::domain::sequence::OpSequence;
use crate::domain::table::Table;
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Complete,
    Failed { step: usize },
}

#[derive(Debug)]
pub struct BacktestEngine {
    table: Table,
    sequences: Vec<OpSequence>,
    outputs: HashSet<ColumnKey>,
    status: RunStatus,
}

impl BacktestEngine {
    /// Build an engine over a seeded table.
    ///
    /// Completed columns the sequences do not write (for example the output
    /// of an earlier run) become read-only input. Every input must be seeded
    /// or written by some operation. Every handle is declared up front so
    /// that `first_value`s are known before step 0.
    pub fn new(table: Table, sequences: Vec<OpSequence>) -> Result<Self, SeqtraderError> {
        let mut table = table;
        let outputs: HashSet<ColumnKey> = sequences
            .iter()
            .flat_map(|seq| seq.outputs())
            .map(|handle| handle.key().clone())
            .collect();
        table.seal_completed(&outputs);

        for seq in &sequences {
            for op in seq.iter() {
                if table.is_seeded(op.output().key()) {
                    return Err(SeqtraderError::ReadOnlyColumn {
                        name: op.output().name(),
                    });
                }
                if let Some(input) = op
                    .inputs()
                    .find(|h| !outputs.contains(h.key()) && !table.is_seeded(h.key()))
                {
                    return Err(SeqtraderError::UnproducedInput {
                        output: op.output().name(),
                        input: input.name(),
                    });
                }
            }
            for handle in seq.handles() {
                table.declare(handle)?;
            }
        }

        Ok(Self {
            table,
            sequences,
            outputs,
            status: RunStatus::Pending,
        })
    }

    /// Like [`BacktestEngine::new`], additionally rejecting any operation
    /// that reads a column no earlier operation (or seeded data) produces.
    pub fn new_strict(table: Table, sequences: Vec<OpSequence>) -> Result<Self, SeqtraderError> {
        let engine = Self::new(table, sequences)?;
        let mut known: HashSet<ColumnKey> = engine
            .table
            .columns()
            .filter(|c| c.raw)
            .map(|c| c.key.clone())
            .collect();
        for seq in &engine.sequences {
            seq.check_order(&mut known)?;
        }
        Ok(engine)
    }

    /// Convenience for a single flattened sequence.
    pub fn with_ops(table: Table, ops: OpSequence) -> Result<Self, SeqtraderError> {
        Self::new(table, vec![ops])
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    pub fn op_count(&self) -> usize {
        self.sequences.iter().map(OpSequence::len).sum()
    }

    /// Run every step. Values this engine wrote in an earlier run are
    /// discarded first; seeded columns are left alone.
    pub fn run(&mut self) -> Result<&Table, SeqtraderError> {
        self.table.clear(&self.outputs);
        self.status = RunStatus::Pending;
        let steps = self.table.len();
        info!(
            steps,
            sequences = self.sequences.len(),
            operations = self.op_count(),
            "starting backtest"
        );

        for step in 0..steps {
            if let Err(e) = self.run_step(step) {
                warn!(step, error = %e, "backtest aborted");
                self.status = RunStatus::Failed { step };
                return Err(e);
            }
        }

        let incomplete = self.table.incomplete_columns(steps);
        if !incomplete.is_empty() {
            debug!(?incomplete, "columns not written at every step");
        }

        self.status = RunStatus::Complete;
        info!(steps, "backtest complete");
        Ok(&self.table)
    }

    fn run_step(&mut self, step: usize) -> Result<(), SeqtraderError> {
        for seq in &self.sequences {
            seq.evaluate_step(&mut self.table, step)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::handle::SeriesHandle;
    use crate::domain::operation::Operation;
    use crate::domain::value::Value;
    use chrono::NaiveDate;

    fn table(n: usize) -> Table {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut t = Table::new(
            (0..n)
                .map(|i| start + chrono::Duration::days(i as i64))
                .collect(),
        );
        let close = SeriesHandle::new("SPX", "Close");
        t.insert_raw(&close, (0..n).map(|i| Value::Num(100.0 + i as f64)).collect())
            .unwrap();
        t
    }

    fn counter() -> OpSequence {
        let count = SeriesHandle::with_first_value("c", "count", 0.0);
        OpSequence::new(vec![Operation::call(
            count.clone(),
            vec![("x", count)],
            |i| Ok(Value::Num(i.get("x")?.f64_at(-2)? + 1.0)),
        )])
    }

    #[test]
    fn one_value_per_step() {
        let mut engine = BacktestEngine::with_ops(table(5), counter()).unwrap();
        let t = engine.run().unwrap();
        let col = t.column(&SeriesHandle::new("c", "count")).unwrap();
        assert_eq!(col.len(), 5);
        assert_eq!(col.values_f64().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(engine.status(), RunStatus::Complete);
    }

    #[test]
    fn rerun_is_identical() {
        let mut engine = BacktestEngine::with_ops(table(4), counter()).unwrap();
        let first = engine.run().unwrap().clone();
        let second = engine.run().unwrap().clone();
        assert_eq!(first, second);
    }

    #[test]
    fn failure_keeps_partial_table() {
        let close = SeriesHandle::new("SPX", "Close");
        let out = SeriesHandle::new("s", "out");
        let seq = OpSequence::new(vec![Operation::call(
            out.clone(),
            vec![("x", close)],
            |i| {
                let x = i.get("x")?;
                if x.step() == 2 {
                    // three-step lookback is out of range at step 2
                    x.get(-4)
                } else {
                    x.last()
                }
            },
        )]);
        let mut engine = BacktestEngine::with_ops(table(5), seq).unwrap();
        let err = engine.run().unwrap_err();
        assert!(matches!(err, SeqtraderError::Operation { step: 2, .. }));
        assert_eq!(engine.status(), RunStatus::Failed { step: 2 });
        assert_eq!(engine.table().column(&out).unwrap().len(), 2);
    }

    #[test]
    fn strict_mode_rejects_misordered_sequences() {
        let a = SeriesHandle::new("g", "a");
        let b = SeriesHandle::new("g", "b");
        let reader = OpSequence::new(vec![Operation::call(
            b,
            vec![("x", a.clone())],
            |i| i.get("x")?.last(),
        )]);
        let writer = OpSequence::new(vec![Operation::set(a, 1.0)]);
        let err = BacktestEngine::new_strict(table(2), vec![reader, writer]).unwrap_err();
        assert!(matches!(err, SeqtraderError::OrderViolation { .. }));
    }

    #[test]
    fn strict_mode_accepts_raw_inputs() {
        let close = SeriesHandle::new("SPX", "Close");
        let twice = SeriesHandle::new("SPX", "twice");
        let seq = OpSequence::new(vec![Operation::call(
            twice.clone(),
            vec![("x", close)],
            |i| Ok(Value::Num(i.get("x")?.f64_at(-1)? * 2.0)),
        )]);
        let mut engine = BacktestEngine::new_strict(table(2), vec![seq]).unwrap();
        let t = engine.run().unwrap();
        assert_eq!(t.last(&twice).unwrap(), Value::Num(202.0));
    }

    fn doubled_close() -> (SeriesHandle, OpSequence) {
        let x = SeriesHandle::new("A", "x");
        let seq = OpSequence::new(vec![Operation::call(
            x.clone(),
            vec![("c", SeriesHandle::new("SPX", "Close"))],
            |i| Ok(Value::Num(i.get("c")?.f64_at(-1)? * 2.0)),
        )]);
        (x, seq)
    }

    fn plus_one(x: &SeriesHandle) -> OpSequence {
        OpSequence::new(vec![Operation::call(
            SeriesHandle::new("B", "y"),
            vec![("x", x.clone())],
            |i| Ok(Value::Num(i.get("x")?.f64_at(-1)? + 1.0)),
        )])
    }

    #[test]
    fn staged_run_reads_completed_columns() {
        let (x, a) = doubled_close();
        let b = plus_one(&x);

        let mut first = BacktestEngine::with_ops(table(5), a.clone()).unwrap();
        first.run().unwrap();
        let mut second = BacktestEngine::new_strict(first.into_table(), vec![b.clone()]).unwrap();
        let staged = second.run().unwrap().clone();
        // rerunning B leaves A's columns untouched
        let rerun = second.run().unwrap().clone();

        let mut joined = BacktestEngine::with_ops(table(5), a + b).unwrap();
        let concatenated = joined.run().unwrap();

        assert_eq!(staged.rows(0, 5), concatenated.rows(0, 5));
        assert_eq!(rerun.rows(0, 5), staged.rows(0, 5));
        assert_eq!(staged.last(&SeriesHandle::new("B", "y")).unwrap(), Value::Num(209.0));
    }

    #[test]
    fn seeded_columns_cannot_be_rewritten() {
        let (x, a) = doubled_close();
        let mut first = BacktestEngine::with_ops(table(3), a).unwrap();
        first.run().unwrap();
        let overwrite = OpSequence::new(vec![Operation::set(x, 1.0)]);
        let err = BacktestEngine::with_ops(first.into_table(), overwrite).unwrap_err();
        assert!(matches!(err, SeqtraderError::ReadOnlyColumn { .. }));
    }

    #[test]
    fn unproduced_input_rejected_at_construction() {
        let out = SeriesHandle::new("s", "out");
        let seq = OpSequence::new(vec![Operation::call(
            out,
            vec![("c", SeriesHandle::new("SPX", "close"))],
            |i| i.get("c")?.last(),
        )]);
        let err = BacktestEngine::with_ops(table(3), seq).unwrap_err();
        assert!(matches!(
            err,
            SeqtraderError::UnproducedInput { ref input, .. } if input == "SPX.close"
        ));
    }

    #[test]
    fn empty_index_completes_immediately() {
        let mut engine =
            BacktestEngine::with_ops(Table::new(vec![]), counter()).unwrap();
        engine.run().unwrap();
        assert_eq!(engine.status(), RunStatus::Complete);
    }
}
