//! Technical indicators over plain numeric series.
//!
//! Every calculation returns a series aligned with its input: element `i`
//! is the indicator value at input index `i`, `None` while the window is
//! not yet filled. The last element is the value for the current step.

pub mod ema;
pub mod sma;

use crate::domain::error::SeqtraderError;
use crate::domain::lookback::LookbackView;
use crate::domain::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
}

impl IndicatorType {
    pub fn period(&self) -> usize {
        match self {
            IndicatorType::Sma(period) | IndicatorType::Ema(period) => *period,
        }
    }

    pub fn calculate(&self, values: &[f64]) -> Vec<Option<f64>> {
        match self {
            IndicatorType::Sma(period) => sma::calculate_sma(values, *period),
            IndicatorType::Ema(period) => ema::calculate_ema(values, *period),
        }
    }

    /// Indicator value at the current step of `src`, `Missing` during warmup.
    ///
    /// `own` is the indicator's own output column. SMA only reads its window
    /// of `src`; EMA continues from its previous output once seeded.
    pub fn last_value(
        &self,
        src: &LookbackView<'_>,
        own: &LookbackView<'_>,
    ) -> Result<Value, SeqtraderError> {
        let period = self.period();
        if period == 0 || src.len() < period {
            return Ok(Value::Missing);
        }
        if let IndicatorType::Ema(_) = self {
            if src.len() > period && own.len() > 1 {
                let ema = ema::next_ema(own.f64_at(-2)?, src.f64_at(-1)?, period);
                return Ok(Some(ema).filter(|x| !x.is_nan()).into());
            }
        }
        let window = (1..=period as isize)
            .rev()
            .map(|back| src.f64_at(-back))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self
            .calculate(&window)
            .last()
            .copied()
            .flatten()
            .into())
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
        }
    }
}
