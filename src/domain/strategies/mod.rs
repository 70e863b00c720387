//! Concrete strategy fragments.
//!
//! Every account fragment keeps an `Invested` column next to its `Total` so
//! that summaries can separate deposits from gains.

pub mod alarm;
pub mod money_avg;
pub mod price;
pub mod saving;
pub mod sma_cross;

pub use alarm::AlarmFragment;
pub use money_avg::MoneyAvgFragment;
pub use price::PriceFragment;
pub use saving::SavingFragment;
pub use sma_cross::{SmaCrossFragment, SmaCrossParams};

use crate::domain::alarm::Alarm;
use crate::domain::error::SeqtraderError;
use crate::domain::fragment::Fragment;
use crate::domain::handle::SeriesHandle;
use crate::domain::operation::Inputs;
use std::fmt;
use std::str::FromStr;

/// Parameter name under which deposit schedules are wired into operations.
pub(crate) const ALARM_INPUT: &str = "alarm";

/// Periodic cash injection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deposit {
    pub amount: f64,
    pub alarm: Alarm,
}

impl Deposit {
    /// `None` when `amount` is zero; negative or non-finite amounts are rejected.
    pub fn new(section: &str, amount: f64, alarm: Alarm) -> Result<Option<Self>, SeqtraderError> {
        check_amount(section, "add_cash", amount)?;
        if amount == 0.0 {
            return Ok(None);
        }
        Ok(Some(Self { amount, alarm }))
    }
}

pub(crate) fn check_amount(section: &str, key: &str, value: f64) -> Result<f64, SeqtraderError> {
    if !value.is_finite() || value < 0.0 {
        return Err(SeqtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{} must be a non-negative number, got {}", key, value),
        });
    }
    Ok(value)
}

/// Cash deposited at the current step.
pub(crate) fn deposit_now(inputs: &Inputs<'_>, deposit: Option<Deposit>) -> Result<f64, SeqtraderError> {
    match deposit {
        Some(d) if inputs.get(ALARM_INPUT)?.bool_at(-1)? => Ok(d.amount),
        _ => Ok(0.0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Saving,
    MoneyAvg,
    SmaCross,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Saving => "saving",
            StrategyKind::MoneyAvg => "money_avg",
            StrategyKind::SmaCross => "sma_cross",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "saving" => Ok(StrategyKind::Saving),
            "money_avg" | "moneyavg" => Ok(StrategyKind::MoneyAvg),
            "sma_cross" | "smacross" => Ok(StrategyKind::SmaCross),
            other => Err(format!(
                "unknown strategy kind '{}' (expected saving, money_avg or sma_cross)",
                other
            )),
        }
    }
}

/// Everything needed to build one fragment, as read from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySpec {
    pub name: String,
    pub kind: StrategyKind,
    /// Instrument traded; `None` means the first configured code.
    pub code: Option<String>,
    pub initial_cash: f64,
    pub add_cash: f64,
    pub alarm: Alarm,
    pub sma: SmaCrossParams,
}

impl StrategySpec {
    pub fn new(name: &str, kind: StrategyKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            code: None,
            initial_cash: 0.0,
            add_cash: 0.0,
            alarm: Alarm::Monthly,
            sma: SmaCrossParams::default(),
        }
    }

    /// Build the fragment trading `src` with the given slippage.
    pub fn build(&self, src: SeriesHandle, slippage_pct: f64) -> Result<Box<dyn Fragment>, SeqtraderError> {
        let deposit = Deposit::new(&self.name, self.add_cash, self.alarm)?;
        let fragment: Box<dyn Fragment> = match self.kind {
            StrategyKind::Saving => Box::new(SavingFragment::new(&self.name, self.initial_cash, deposit)?),
            StrategyKind::MoneyAvg => Box::new(MoneyAvgFragment::new(
                &self.name,
                src,
                self.initial_cash,
                self.add_cash,
                self.alarm,
                slippage_pct,
            )?),
            StrategyKind::SmaCross => Box::new(SmaCrossFragment::new(
                &self.name,
                src,
                self.sma,
                self.initial_cash,
                deposit,
                slippage_pct,
            )?),
        };
        Ok(fragment)
    }
}
