//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_table_report::CsvTableReport;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    build_backtest_config, build_strategy_specs, strategy_code, BacktestConfig,
};
use crate::domain::engine::BacktestEngine;
use crate::domain::error::SeqtraderError;
use crate::domain::fragment::Fragment;
use crate::domain::market_data::MarketData;
use crate::domain::metrics::StrategySummary;
use crate::domain::sequence::OpSequence;
use crate::domain::strategies::StrategySpec;
use crate::domain::table::Table;
use crate::domain::universe::{load_universe, parse_codes};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "seqtrader", about = "Single-pass strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every configured strategy over the same market data
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Export the full result table as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the last N rows of the result table
        #[arg(long)]
        tail: Option<usize>,
    },
    /// Validate a configuration without fetching data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List available symbols on an exchange
    ListSymbols {
        #[arg(long)]
        data_dir: PathBuf,
        #[arg(long)]
        exchange: String,
    },
    /// Show data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: Option<String>,
        #[arg(long)]
        exchange: Option<String>,
    },
}

/// Result of a completed comparison run.
#[derive(Debug)]
pub struct BacktestOutcome {
    pub table: Table,
    pub summaries: Vec<StrategySummary>,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            output,
            tail,
        } => run_backtest(&config, output.as_deref(), tail),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { data_dir, exchange } => run_list_symbols(data_dir, &exchange),
        Command::Info {
            config,
            code,
            exchange,
        } => run_info(&config, code.as_deref(), exchange.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, SeqtraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| SeqtraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Build and cross-check everything a run needs from configuration.
pub fn load_run_config(
    config: &dyn ConfigPort,
) -> Result<(BacktestConfig, Vec<StrategySpec>), SeqtraderError> {
    let backtest = build_backtest_config(config)?;
    let specs = build_strategy_specs(config)?;
    for spec in &specs {
        strategy_code(spec, &backtest)?;
    }
    Ok((backtest, specs))
}

/// One fragment per spec, each trading its instrument's close.
pub fn build_fragments(
    backtest: &BacktestConfig,
    specs: &[StrategySpec],
) -> Result<Vec<Box<dyn Fragment>>, SeqtraderError> {
    specs
        .iter()
        .map(|spec| {
            let code = strategy_code(spec, backtest)?;
            let fragment = spec.build(MarketData::handle(code, "Close"), backtest.slippage_pct)?;
            for line in fragment.debug_handles() {
                debug!(strategy = %spec.name, "{}", line);
            }
            Ok(fragment)
        })
        .collect()
}

/// Load data, run all fragments in one engine pass and summarise them.
pub fn run_backtest_pipeline(
    backtest: &BacktestConfig,
    specs: &[StrategySpec],
    data_port: &dyn DataPort,
) -> Result<BacktestOutcome, SeqtraderError> {
    let fragments = build_fragments(backtest, specs)?;

    let data = load_universe(
        data_port,
        &backtest.codes,
        &backtest.exchange,
        backtest.start_date,
        backtest.end_date,
    )?;
    let table = data.into_table()?;
    info!(steps = table.len(), strategies = fragments.len(), "seeded table");

    let sequences: Vec<OpSequence> = fragments.iter().map(|f| f.ops()).collect();
    let mut engine = if backtest.strict {
        BacktestEngine::new_strict(table, sequences)?
    } else {
        BacktestEngine::new(table, sequences)?
    };
    engine.run()?;
    let table = engine.into_table();

    let summaries = fragments
        .iter()
        .map(|f| StrategySummary::from_fragment(f.as_ref(), &table))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BacktestOutcome { table, summaries })
}

fn run_backtest(
    config_path: &Path,
    output_path: Option<&Path>,
    tail: Option<usize>,
) -> Result<(), SeqtraderError> {
    info!(config = %config_path.display(), "loading config");
    let config = load_config(config_path)?;
    let (backtest, specs) = load_run_config(&config)?;

    let data_port = CsvAdapter::new(backtest.data_dir.clone());
    let outcome = run_backtest_pipeline(&backtest, &specs, &data_port)?;

    println!(
        "{} {} to {} ({} steps)",
        backtest.exchange,
        backtest.start_date,
        backtest.end_date,
        outcome.table.len()
    );
    for summary in &outcome.summaries {
        println!("{}", summary);
    }

    if let Some(n) = tail {
        print_rows(&outcome.table.headers(), &outcome.table.tail(n));
    }

    if let Some(path) = output_path {
        CsvTableReport::new().write_with_summaries(&outcome.table, &outcome.summaries, path)?;
        eprintln!("Table written to: {}", path.display());
    }
    Ok(())
}

fn print_rows(headers: &[String], rows: &[Vec<String>]) {
    println!("{}", headers.join("\t"));
    for row in rows {
        println!("{}", row.join("\t"));
    }
}

fn run_validate(config_path: &Path) -> Result<(), SeqtraderError> {
    eprintln!("Validating config: {}", config_path.display());
    let config = load_config(config_path)?;
    let (backtest, specs) = load_run_config(&config)?;

    eprintln!("\nUniverse:");
    eprintln!("  exchange: {}", backtest.exchange);
    eprintln!("  codes:    {}", backtest.codes.join(", "));
    eprintln!("  range:    {} to {}", backtest.start_date, backtest.end_date);

    eprintln!("\nStrategies:");
    for spec in &specs {
        eprintln!(
            "  {} ({}) on {}",
            spec.name,
            spec.kind,
            strategy_code(spec, &backtest)?
        );
    }

    // Building the fragments checks the remaining per-strategy parameters.
    build_fragments(&backtest, &specs)?;
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn run_list_symbols(data_dir: PathBuf, exchange: &str) -> Result<(), SeqtraderError> {
    let adapter = CsvAdapter::new(data_dir);
    let symbols = adapter.list_symbols(exchange)?;

    if symbols.is_empty() {
        eprintln!("No symbols found for exchange {}", exchange);
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn run_info(
    config_path: &Path,
    code: Option<&str>,
    exchange: Option<&str>,
) -> Result<(), SeqtraderError> {
    let config = load_config(config_path)?;
    let data_dir = config
        .get_string("backtest", "data_dir")
        .ok_or_else(|| SeqtraderError::ConfigMissing {
            section: "backtest".to_string(),
            key: "data_dir".to_string(),
        })?;
    let exchange = match exchange {
        Some(e) => e.to_string(),
        None => config
            .get_string("backtest", "exchange")
            .ok_or_else(|| SeqtraderError::ConfigMissing {
                section: "backtest".to_string(),
                key: "exchange".to_string(),
            })?,
    };
    let codes = resolve_codes(code, &config)?;

    let adapter = CsvAdapter::new(PathBuf::from(data_dir.trim()));
    for c in &codes {
        match adapter.get_data_range(c, &exchange)? {
            Some((min_date, max_date, count)) => {
                println!("{}.{}: {} bars, {} to {}", c, exchange, count, min_date, max_date);
            }
            None => eprintln!("{}.{}: no data found", c, exchange),
        }
    }
    Ok(())
}

/// `--code` wins over `[backtest] codes`, which wins over `[backtest] code`.
pub fn resolve_codes(
    code_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, SeqtraderError> {
    let (key, value) = match code_override {
        Some(c) => ("code", c.to_string()),
        None => match (
            config.get_string("backtest", "codes"),
            config.get_string("backtest", "code"),
        ) {
            (Some(c), _) => ("codes", c),
            (None, Some(c)) => ("code", c),
            (None, None) => {
                return Err(SeqtraderError::ConfigMissing {
                    section: "backtest".to_string(),
                    key: "code".to_string(),
                })
            }
        },
    };
    parse_codes(&value).map_err(|e| SeqtraderError::ConfigInvalid {
        section: "backtest".to_string(),
        key: key.to_string(),
        reason: e.to_string(),
    })
}
