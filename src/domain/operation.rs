//! Atomic per-step operations.
//!
//! An operation reads named inputs as lookback views and writes exactly one
//! value to its output handle at the current step.

use crate::domain::error::SeqtraderError;
use crate::domain::handle::SeriesHandle;
use crate::domain::lookback::LookbackView;
use crate::domain::table::Table;
use crate::domain::value::Value;
use std::fmt;
use std::sync::Arc;

pub type OpFn = Arc<dyn Fn(&Inputs<'_>) -> Result<Value, SeqtraderError> + Send + Sync>;

/// Resolved inputs handed to an operation's function, keyed by parameter name.
pub struct Inputs<'a> {
    output: &'a SeriesHandle,
    views: Vec<(&'a str, LookbackView<'a>)>,
}

impl<'a> Inputs<'a> {
    pub fn get(&self, param: &str) -> Result<&LookbackView<'a>, SeqtraderError> {
        self.views
            .iter()
            .find(|(name, _)| *name == param)
            .map(|(_, view)| view)
            .ok_or_else(|| SeqtraderError::MissingInput {
                output: self.output.name(),
                param: param.to_string(),
            })
    }

    pub fn output(&self) -> &SeriesHandle {
        self.output
    }
}

#[derive(Clone)]
pub enum OpKind {
    Call {
        inputs: Vec<(String, SeriesHandle)>,
        function: OpFn,
    },
    /// Writes a fixed literal every step.
    Set(Value),
}

#[derive(Clone)]
pub struct Operation {
    output: SeriesHandle,
    kind: OpKind,
}

impl Operation {
    pub fn call<F>(output: SeriesHandle, inputs: Vec<(&str, SeriesHandle)>, function: F) -> Self
    where
        F: Fn(&Inputs<'_>) -> Result<Value, SeqtraderError> + Send + Sync + 'static,
    {
        Self {
            output,
            kind: OpKind::Call {
                inputs: inputs
                    .into_iter()
                    .map(|(name, handle)| (name.to_string(), handle))
                    .collect(),
                function: Arc::new(function),
            },
        }
    }

    pub fn set(output: SeriesHandle, value: impl Into<Value>) -> Self {
        Self {
            output,
            kind: OpKind::Set(value.into()),
        }
    }

    pub fn output(&self) -> &SeriesHandle {
        &self.output
    }

    pub fn kind(&self) -> &OpKind {
        &self.kind
    }

    pub fn inputs(&self) -> impl Iterator<Item = &SeriesHandle> {
        let inputs: &[(String, SeriesHandle)] = match &self.kind {
            OpKind::Call { inputs, .. } => inputs,
            OpKind::Set(_) => &[],
        };
        inputs.iter().map(|(_, handle)| handle)
    }

    /// Compute this step's value and write it to the output column.
    ///
    /// Failures are wrapped with the output handle, step and timestamp.
    pub fn evaluate(&self, table: &mut Table, step: usize) -> Result<(), SeqtraderError> {
        let date = table.date(step).ok_or_else(|| SeqtraderError::Lookback {
            handle: self.output.name(),
            step,
            offset: 0,
            available: table.len(),
        })?;
        let wrap = |source: SeqtraderError| SeqtraderError::Operation {
            handle: self.output.name(),
            step,
            date,
            source: Box::new(source),
        };

        let value = match &self.kind {
            OpKind::Set(value) => *value,
            OpKind::Call { inputs, function } => {
                let views = inputs
                    .iter()
                    .map(|(name, handle)| {
                        table
                            .view(handle, step)
                            .map(|view| (name.as_str(), view))
                    })
                    .collect::<Result<Vec<_>, SeqtraderError>>()
                    .map_err(wrap)?;
                let resolved = Inputs {
                    output: &self.output,
                    views,
                };
                function(&resolved).map_err(wrap)?
            }
        };

        table.write(&self.output, step, value).map_err(wrap)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OpKind::Set(value) => f
                .debug_struct("Set")
                .field("output", &self.output.name())
                .field("value", value)
                .finish(),
            OpKind::Call { inputs, .. } => f
                .debug_struct("Call")
                .field("output", &self.output.name())
                .field(
                    "inputs",
                    &inputs
                        .iter()
                        .map(|(name, handle)| format!("{}={}", name, handle))
                        .collect::<Vec<_>>(),
                )
                .finish(),
        }
    }
}
