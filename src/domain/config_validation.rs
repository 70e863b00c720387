//! Configuration parsing and validation.
//!
//! Everything is checked before any market data is fetched.

use crate::domain::alarm::Alarm;
use crate::domain::error::SeqtraderError;
use crate::domain::strategies::{SmaCrossParams, StrategyKind, StrategySpec};
use crate::domain::universe::{parse_codes, parse_list};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub data_dir: PathBuf,
    pub exchange: String,
    pub codes: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub slippage_pct: f64,
    pub strict: bool,
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SeqtraderError> {
    build_backtest_config(config).map(|_| ())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), SeqtraderError> {
    build_strategy_specs(config).map(|_| ())
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, SeqtraderError> {
    let data_dir = required(config, "backtest", "data_dir")?;
    let exchange = required(config, "backtest", "exchange")?;
    let codes = parse_backtest_codes(config)?;
    let start_date = parse_date(config.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(config.get_string("backtest", "end_date").as_deref(), "end_date")?;
    if start_date >= end_date {
        return Err(SeqtraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "start_date".to_string(),
            reason: "start_date must be before end_date".to_string(),
        });
    }

    let slippage_pct = parse_number::<f64>(config, "backtest", "slippage_pct")?.unwrap_or(0.0);
    if !slippage_pct.is_finite() || !(0.0..100.0).contains(&slippage_pct) {
        return Err(SeqtraderError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "slippage_pct".to_string(),
            reason: "slippage_pct must be in [0, 100)".to_string(),
        });
    }

    Ok(BacktestConfig {
        data_dir: PathBuf::from(data_dir),
        exchange,
        codes,
        start_date,
        end_date,
        slippage_pct,
        strict: config.get_bool("backtest", "strict", false),
    })
}

/// One spec per name listed in `[strategies] names`, in listed order.
pub fn build_strategy_specs(config: &dyn ConfigPort) -> Result<Vec<StrategySpec>, SeqtraderError> {
    let names_str = required(config, "strategies", "names")?;
    let names = parse_list(&names_str).map_err(|e| SeqtraderError::ConfigInvalid {
        section: "strategies".to_string(),
        key: "names".to_string(),
        reason: e.to_string(),
    })?;

    names
        .iter()
        .map(|name| build_strategy_spec(config, name))
        .collect()
}

/// Instrument a strategy trades: its own `code`, or the first configured one.
pub fn strategy_code<'a>(
    spec: &'a StrategySpec,
    backtest: &'a BacktestConfig,
) -> Result<&'a str, SeqtraderError> {
    match &spec.code {
        Some(code) if backtest.codes.contains(code) => Ok(code),
        Some(code) => Err(SeqtraderError::ConfigInvalid {
            section: spec.name.clone(),
            key: "code".to_string(),
            reason: format!("{} is not listed in [backtest] codes", code),
        }),
        None => backtest
            .codes
            .first()
            .map(String::as_str)
            .ok_or_else(|| SeqtraderError::ConfigMissing {
                section: "backtest".to_string(),
                key: "code".to_string(),
            }),
    }
}

fn build_strategy_spec(config: &dyn ConfigPort, name: &str) -> Result<StrategySpec, SeqtraderError> {
    if name.contains('.') {
        return Err(SeqtraderError::ConfigInvalid {
            section: "strategies".to_string(),
            key: "names".to_string(),
            reason: format!("strategy name '{}' must not contain '.'", name),
        });
    }
    if !config.has_section(name) {
        return Err(SeqtraderError::ConfigMissing {
            section: name.to_string(),
            key: "kind".to_string(),
        });
    }

    let kind = parse_parsed::<StrategyKind>(config, name, "kind")?.ok_or_else(|| {
        SeqtraderError::ConfigMissing {
            section: name.to_string(),
            key: "kind".to_string(),
        }
    })?;

    let mut spec = StrategySpec::new(name, kind);
    spec.code = config
        .get_string(name, "code")
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty());
    spec.initial_cash = non_negative(config, name, "initial_cash")?;
    spec.add_cash = non_negative(config, name, "add_cash")?;
    spec.alarm = parse_parsed::<Alarm>(config, name, "alarm")?.unwrap_or(Alarm::Monthly);

    if kind == StrategyKind::SmaCross {
        spec.sma = parse_sma_params(config, name)?;
    }
    Ok(spec)
}

fn parse_sma_params(config: &dyn ConfigPort, section: &str) -> Result<SmaCrossParams, SeqtraderError> {
    let window = |key: &str| -> Result<usize, SeqtraderError> {
        Ok(parse_number::<usize>(config, section, key)?.unwrap_or(0))
    };
    let exponential = match config.get_string(section, "average") {
        None => false,
        Some(s) => match s.trim().to_lowercase().as_str() {
            "sma" => false,
            "ema" => true,
            other => {
                return Err(SeqtraderError::ConfigInvalid {
                    section: section.to_string(),
                    key: "average".to_string(),
                    reason: format!("unknown average '{}' (expected sma or ema)", other),
                })
            }
        },
    };

    let params = SmaCrossParams {
        exponential,
        long_entry_fast: window("long_entry_fast_sma")?,
        long_entry_slow: window("long_entry_slow_sma")?,
        long_exit_fast: window("long_exit_fast_sma")?,
        long_exit_slow: window("long_exit_slow_sma")?,
        short_entry_fast: window("short_entry_fast_sma")?,
        short_entry_slow: window("short_entry_slow_sma")?,
        short_exit_fast: window("short_exit_fast_sma")?,
        short_exit_slow: window("short_exit_slow_sma")?,
    };
    params.validate(section)?;
    Ok(params)
}

fn parse_backtest_codes(config: &dyn ConfigPort) -> Result<Vec<String>, SeqtraderError> {
    let (key, value) = match (
        config.get_string("backtest", "codes"),
        config.get_string("backtest", "code"),
    ) {
        (Some(c), _) if !c.trim().is_empty() => ("codes", c),
        (_, Some(c)) if !c.trim().is_empty() => ("code", c),
        _ => {
            return Err(SeqtraderError::ConfigMissing {
                section: "backtest".to_string(),
                key: "code".to_string(),
            })
        }
    };
    parse_codes(&value).map_err(|e| SeqtraderError::ConfigInvalid {
        section: "backtest".to_string(),
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, SeqtraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(SeqtraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, SeqtraderError> {
    match value {
        None => Err(SeqtraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            SeqtraderError::ConfigInvalid {
                section: "backtest".to_string(),
                key: field.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", field),
            }
        }),
    }
}

/// Absent keys are `None`; present but unparsable values are errors.
fn parse_parsed<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<T>, SeqtraderError>
where
    T: FromStr<Err = String>,
{
    config
        .get_string(section, key)
        .map(|s| {
            s.parse::<T>().map_err(|reason| SeqtraderError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason,
            })
        })
        .transpose()
}

fn parse_number<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, SeqtraderError> {
    config
        .get_string(section, key)
        .map(|s| {
            s.trim().parse::<T>().map_err(|_| SeqtraderError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("'{}' is not a valid number", s.trim()),
            })
        })
        .transpose()
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, SeqtraderError> {
    let value = parse_number::<f64>(config, section, key)?.unwrap_or(0.0);
    if !value.is_finite() || value < 0.0 {
        return Err(SeqtraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: format!("{} must be non-negative", key),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    const BACKTEST: &str = "[backtest]\ndata_dir = ./data\nexchange = US\ncode = SPX\nstart_date = 2020-01-01\nend_date = 2024-12-31\n";

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with_strategies(extra: &str) -> FileConfigAdapter {
        make_config(&format!("{}{}", BACKTEST, extra))
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
data_dir = ./data
exchange = US
code = spx
start_date = 2000-01-01
end_date = 2023-11-01
slippage_pct = 0.5
strict = true
"#,
        );
        let bt = build_backtest_config(&config).unwrap();
        assert_eq!(bt.codes, vec!["SPX"]);
        assert_eq!(bt.slippage_pct, 0.5);
        assert!(bt.strict);
        assert_eq!(bt.data_dir, PathBuf::from("./data"));
    }

    #[test]
    fn slippage_out_of_range_fails() {
        for value in ["-0.01", "100", "abc"] {
            let config = make_config(&format!("{}slippage_pct = {}\n", BACKTEST, value));
            let err = validate_backtest_config(&config).unwrap_err();
            assert!(
                matches!(err, SeqtraderError::ConfigInvalid { ref key, .. } if key == "slippage_pct")
            );
        }
    }

    #[test]
    fn invalid_start_date_format_fails() {
        let config = make_config("[backtest]\ndata_dir = d\nexchange = US\ncode = SPX\nstart_date = 2020/01/01\nend_date = 2024-12-31\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn missing_end_date_fails() {
        let config = make_config("[backtest]\ndata_dir = d\nexchange = US\ncode = SPX\nstart_date = 2020-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigMissing { key, .. } if key == "end_date"));
    }

    #[test]
    fn start_date_after_end_date_fails() {
        let config = make_config("[backtest]\ndata_dir = d\nexchange = US\ncode = SPX\nstart_date = 2024-12-31\nend_date = 2020-01-01\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigInvalid { key, .. } if key == "start_date"));
    }

    #[test]
    fn missing_exchange_fails() {
        let config = make_config("[backtest]\ndata_dir = d\nstart_date = 2020-01-01\nend_date = 2024-12-31\ncode = SPX\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigMissing { key, .. } if key == "exchange"));
    }

    #[test]
    fn missing_code_fails() {
        let config = make_config("[backtest]\ndata_dir = d\nexchange = US\nstart_date = 2020-01-01\nend_date = 2024-12-31\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigMissing { key, .. } if key == "code"));
    }

    #[test]
    fn codes_field_accepted() {
        let config = make_config("[backtest]\ndata_dir = d\nexchange = US\nstart_date = 2020-01-01\nend_date = 2024-12-31\ncodes = SPX, QQQ\n");
        assert_eq!(build_backtest_config(&config).unwrap().codes, vec!["SPX", "QQQ"]);
    }

    #[test]
    fn duplicate_codes_fail() {
        let config = make_config("[backtest]\ndata_dir = d\nexchange = US\nstart_date = 2020-01-01\nend_date = 2024-12-31\ncodes = SPX,spx\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigInvalid { key, .. } if key == "codes"));
    }

    #[test]
    fn strategy_specs_in_listed_order() {
        let config = with_strategies(
            r#"
[strategies]
names = saving, cross

[saving]
kind = saving
initial_cash = 1000
add_cash = 100
alarm = monthly

[cross]
kind = sma_cross
initial_cash = 1000
alarm = weekly
long_entry_fast_sma = 50
long_entry_slow_sma = 200
long_exit_fast_sma = 50
long_exit_slow_sma = 200
"#,
        );
        let specs = build_strategy_specs(&config).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "saving");
        assert_eq!(specs[0].kind, StrategyKind::Saving);
        assert_eq!(specs[0].add_cash, 100.0);
        assert_eq!(specs[1].alarm, Alarm::Weekly);
        assert_eq!(specs[1].sma.long_entry_slow, 200);
        assert_eq!(specs[1].sma.short_entry_fast, 0);
    }

    #[test]
    fn missing_names_fails() {
        let err = validate_strategy_config(&make_config(BACKTEST)).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigMissing { key, .. } if key == "names"));
    }

    #[test]
    fn missing_strategy_section_fails() {
        let config = with_strategies("[strategies]\nnames = ghost\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigMissing { section, .. } if section == "ghost"));
    }

    #[test]
    fn unknown_kind_fails() {
        let config = with_strategies("[strategies]\nnames = a\n\n[a]\nkind = momentum\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigInvalid { key, .. } if key == "kind"));
    }

    #[test]
    fn unknown_alarm_fails() {
        let config = with_strategies("[strategies]\nnames = a\n\n[a]\nkind = saving\nalarm = hourly\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigInvalid { key, .. } if key == "alarm"));
    }

    #[test]
    fn negative_cash_fails() {
        let config = with_strategies("[strategies]\nnames = a\n\n[a]\nkind = saving\ninitial_cash = -5\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigInvalid { key, .. } if key == "initial_cash"));
    }

    #[test]
    fn half_configured_sma_pair_fails() {
        let config = with_strategies(
            "[strategies]\nnames = c\n\n[c]\nkind = sma_cross\nlong_entry_fast_sma = 50\n",
        );
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigInvalid { .. }));
    }

    #[test]
    fn non_numeric_window_fails() {
        let config = with_strategies(
            "[strategies]\nnames = c\n\n[c]\nkind = sma_cross\nlong_entry_fast_sma = fifty\nlong_entry_slow_sma = 200\n",
        );
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(
            matches!(err, SeqtraderError::ConfigInvalid { key, .. } if key == "long_entry_fast_sma")
        );
    }

    #[test]
    fn ema_average_selected() {
        let config = with_strategies(
            "[strategies]\nnames = c\n\n[c]\nkind = sma_cross\naverage = ema\nlong_entry_fast_sma = 5\nlong_entry_slow_sma = 20\n",
        );
        let specs = build_strategy_specs(&config).unwrap();
        assert!(specs[0].sma.exponential);
    }

    #[test]
    fn duplicate_names_fail() {
        let config = with_strategies("[strategies]\nnames = a, a\n\n[a]\nkind = saving\n");
        let err = validate_strategy_config(&config).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigInvalid { key, .. } if key == "names"));
    }

    #[test]
    fn strategy_code_defaults_to_first_code() {
        let config = make_config(
            "[backtest]\ndata_dir = d\nexchange = US\ncodes = SPX, QQQ\nstart_date = 2020-01-01\nend_date = 2024-12-31\n\n[strategies]\nnames = a, b, c\n\n[a]\nkind = saving\n\n[b]\nkind = money_avg\ncode = qqq\n\n[c]\nkind = money_avg\ncode = DIA\n",
        );
        let bt = build_backtest_config(&config).unwrap();
        let specs = build_strategy_specs(&config).unwrap();
        assert_eq!(strategy_code(&specs[0], &bt).unwrap(), "SPX");
        assert_eq!(strategy_code(&specs[1], &bt).unwrap(), "QQQ");
        let err = strategy_code(&specs[2], &bt).unwrap_err();
        assert!(matches!(err, SeqtraderError::ConfigInvalid { section, .. } if section == "c"));
    }

    #[test]
    fn dotted_names_fail() {
        let config = with_strategies("[strategies]\nnames = a.b\n");
        assert!(validate_strategy_config(&config).is_err());
    }
}
