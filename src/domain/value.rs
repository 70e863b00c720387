//! Scalar cell values stored in table columns.

use crate::domain::error::SeqtraderError;
use chrono::NaiveDate;
use std::fmt;

/// One cell of a column.
///
/// `Missing` marks a value that is not available yet (e.g. an indicator
/// still inside its warmup window). It is falsy and coerces to NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Num(f64),
    Bool(bool),
    Date(NaiveDate),
    Missing,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Bool(_) => "bool",
            Value::Date(_) => "date",
            Value::Missing => "missing",
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Truthiness used by signal logic: non-zero numbers and `true` are truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Num(v) => *v != 0.0 && !v.is_nan(),
            Value::Bool(b) => *b,
            Value::Date(_) => true,
            Value::Missing => false,
        }
    }

    pub fn as_f64(&self) -> Result<f64, SeqtraderError> {
        match self {
            Value::Num(v) => Ok(*v),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Missing => Ok(f64::NAN),
            Value::Date(_) => Err(SeqtraderError::TypeMismatch {
                expected: "number",
                found: self.type_name(),
            }),
        }
    }

    pub fn as_date(&self) -> Result<NaiveDate, SeqtraderError> {
        match self {
            Value::Date(d) => Ok(*d),
            other => Err(SeqtraderError::TypeMismatch {
                expected: "date",
                found: other.type_name(),
            }),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map(Value::Num).unwrap_or(Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Missing => Ok(()),
        }
    }
}
