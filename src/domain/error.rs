//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for seqtrader.
#[derive(Debug, thiserror::Error)]
pub enum SeqtraderError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("lookback out of range for {handle} at step {step}: offset {offset}, {available} values available")]
    Lookback {
        handle: String,
        step: usize,
        offset: isize,
        available: usize,
    },

    #[error("{handle} has no value at step {step} yet")]
    UnsetValue { handle: String, step: usize },

    #[error("operation writing {output} has no input named '{param}'")]
    MissingInput { output: String, param: String },

    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown column {name}")]
    UnknownColumn { name: String },

    #[error("operation writing {output} reads {input}, which is neither seeded nor written by any operation")]
    UnproducedInput { output: String, input: String },

    #[error("column {name} is read-only raw data")]
    ReadOnlyColumn { name: String },

    #[error("conflicting first values for {name}: {first} vs {second}")]
    ConflictingFirstValue {
        name: String,
        first: String,
        second: String,
    },

    #[error("operation #{index} writing {output} reads {input} before any operation produces it")]
    OrderViolation {
        index: usize,
        output: String,
        input: String,
    },

    #[error("ambiguous signals for {fragment} at {date}: {reason}")]
    AmbiguousSignal {
        fragment: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("no data for {code} on {exchange}")]
    NoData { code: String, exchange: String },

    #[error("misaligned date index for {code}: {reason}")]
    MisalignedIndex { code: String, reason: String },

    #[error("data source error: {reason}")]
    Database { reason: String },

    #[error("operation writing {handle} failed at step {step} ({date}): {source}")]
    Operation {
        handle: String,
        step: usize,
        date: NaiveDate,
        #[source]
        source: Box<SeqtraderError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SeqtraderError {
    /// Strip [`SeqtraderError::Operation`] wrappers down to the original cause.
    pub fn root_cause(&self) -> &SeqtraderError {
        match self {
            SeqtraderError::Operation { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<&SeqtraderError> for std::process::ExitCode {
    fn from(err: &SeqtraderError) -> Self {
        let code: u8 = match err {
            SeqtraderError::Io(_) => 1,
            SeqtraderError::ConfigParse { .. }
            | SeqtraderError::ConfigMissing { .. }
            | SeqtraderError::ConfigInvalid { .. } => 2,
            SeqtraderError::NoData { .. }
            | SeqtraderError::MisalignedIndex { .. }
            | SeqtraderError::Database { .. } => 3,
            SeqtraderError::Lookback { .. }
            | SeqtraderError::UnsetValue { .. }
            | SeqtraderError::MissingInput { .. }
            | SeqtraderError::TypeMismatch { .. }
            | SeqtraderError::UnknownColumn { .. }
            | SeqtraderError::UnproducedInput { .. }
            | SeqtraderError::ReadOnlyColumn { .. }
            | SeqtraderError::ConflictingFirstValue { .. }
            | SeqtraderError::OrderViolation { .. } => 4,
            SeqtraderError::AmbiguousSignal { .. } | SeqtraderError::Operation { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
