//! Per-fragment result summaries.

use crate::domain::error::SeqtraderError;
use crate::domain::fragment::Fragment;
use crate::domain::table::Table;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct StrategySummary {
    pub name: String,
    pub final_total: f64,
    pub invested: f64,
    pub gain: f64,
    pub gain_pct: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub steps: usize,
}

impl StrategySummary {
    /// `total` is the fragment's total column, `invested` the capital paid in.
    pub fn compute(name: &str, total: &[f64], invested: f64) -> Self {
        let final_total = total.last().copied().unwrap_or(invested);
        let gain = final_total - invested;
        let gain_pct = if invested > 0.0 {
            gain / invested * 100.0
        } else {
            0.0
        };
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(total);

        StrategySummary {
            name: name.to_string(),
            final_total,
            invested,
            gain,
            gain_pct,
            max_drawdown,
            max_drawdown_duration,
            steps: total.len(),
        }
    }

    /// Summarise a fragment from a completed run.
    pub fn from_fragment(fragment: &dyn Fragment, table: &Table) -> Result<Self, SeqtraderError> {
        let total = fragment.total(table)?;
        let invested = fragment.invested(table)?;
        Ok(Self::compute(fragment.name(), &total, invested))
    }
}

impl fmt::Display for StrategySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<16} total {:>14.2}  invested {:>14.2}  gain {:>14.2} ({:>7.2}%)  max dd {:>6.2}% over {} steps",
            self.name,
            self.final_total,
            self.invested,
            self.gain,
            self.gain_pct,
            self.max_drawdown * 100.0,
            self.max_drawdown_duration,
        )
    }
}

/// Largest peak-to-trough fall as a fraction of the peak, and the longest
/// run of steps spent below a peak. NaN values are skipped.
fn compute_drawdown(total: &[f64]) -> (f64, usize) {
    let mut values = total.iter().copied().filter(|v| !v.is_nan());
    let Some(mut peak) = values.next() else {
        return (0.0, 0);
    };

    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for value in values {
        if value >= peak {
            peak = value;
            current_dd_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn summary_gain() {
        let s = StrategySummary::compute("avg", &[1000.0, 1100.0, 1320.0], 1100.0);
        assert_relative_eq!(s.final_total, 1320.0);
        assert_relative_eq!(s.gain, 220.0);
        assert_relative_eq!(s.gain_pct, 20.0);
        assert_eq!(s.steps, 3);
    }

    #[test]
    fn summary_of_empty_run() {
        let s = StrategySummary::compute("saving", &[], 1000.0);
        assert_relative_eq!(s.final_total, 1000.0);
        assert_relative_eq!(s.gain, 0.0);
        assert_eq!(s.max_drawdown_duration, 0);
    }

    #[test]
    fn zero_invested_has_zero_pct() {
        let s = StrategySummary::compute("x", &[5.0], 0.0);
        assert_relative_eq!(s.gain_pct, 0.0);
    }

    #[test]
    fn max_drawdown() {
        let (dd, _) = compute_drawdown(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        assert_relative_eq!(dd, (110.0 - 80.0) / 110.0);
    }

    #[test]
    fn max_drawdown_duration() {
        let (_, duration) = compute_drawdown(&[100.0, 110.0, 100.0, 90.0, 85.0, 95.0]);
        assert_eq!(duration, 4);
    }

    #[test]
    fn flat_total_has_no_drawdown() {
        assert_eq!(compute_drawdown(&[1000.0; 10]), (0.0, 0));
    }

    #[test]
    fn display_mentions_name() {
        let s = StrategySummary::compute("cross", &[100.0, 90.0], 100.0);
        let line = s.to_string();
        assert!(line.starts_with("cross"));
        assert!(line.contains("-10.00"));
    }
}
