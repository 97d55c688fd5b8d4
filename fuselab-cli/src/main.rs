//! FuseLab CLI: run, compare, and profiles commands.
//!
//! Commands:
//! - `run`: backtest one ticker with the conservative and/or aggressive profile
//! - `compare`: backtest several tickers in parallel and combine them equal-weight,
//!   optionally blending chosen (ticker, profile) runs with custom weights
//! - `profiles`: print the canonical strategy profiles as TOML

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use fuselab_core::{PredictionKind, StrategyProfile};
use fuselab_runner::export::{format_exit_reasons, format_summary_table};
use fuselab_runner::runner::run_ticker;
use fuselab_runner::{
    run_comparison, save_artifacts, save_comparison, save_weighted, BacktestConfig,
    BacktestResult, PortfolioLeg,
};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fuselab",
    about = "FuseLab CLI: indicator + forecast fused backtester"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a single ticker.
    Run {
        /// Ticker symbol (overrides the config's ticker list).
        #[arg(long)]
        ticker: Option<String>,

        /// OHLCV CSV for the ticker.
        #[arg(long)]
        bars: Option<PathBuf>,

        /// Primary (LSTM) forecast CSV.
        #[arg(long)]
        lstm_path: Option<PathBuf>,

        /// Secondary (random forest) forecast CSV.
        #[arg(long)]
        rf_path: Option<PathBuf>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Backtest several tickers and combine them equal-weight.
    Compare {
        /// Ticker symbols (override the config's ticker list).
        tickers: Vec<String>,

        /// Directory of `{TICKER}.csv` bar files.
        #[arg(long)]
        bars_dir: Option<PathBuf>,

        /// Directory of `{TICKER}.csv` primary forecasts.
        #[arg(long)]
        lstm_dir: Option<PathBuf>,

        /// Directory of `{TICKER}.csv` secondary forecasts.
        #[arg(long)]
        rf_dir: Option<PathBuf>,

        /// Run tickers one after another instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// `TICKER:PROFILE` run to include in a weighted portfolio (repeatable).
        #[arg(long = "leg")]
        legs: Vec<String>,

        /// One weight per `--leg`, summing to 1 (equal weights when omitted).
        #[arg(long, num_args = 1..)]
        weights: Vec<f64>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print strategy profiles as TOML (canonical plus any from --config).
    Profiles {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// conservative, aggressive, both, or a custom profile name.
    #[arg(long)]
    strategy: Option<String>,

    /// Starting capital (split equally across tickers in `compare`).
    #[arg(long)]
    capital: Option<f64>,

    /// How forecasts are read: `price` (predicted close) or `delta` (predicted change).
    #[arg(long)]
    prediction_kind: Option<PredictionKind>,

    /// Annual risk-free rate for Sharpe/Sortino.
    #[arg(long)]
    risk_free_rate: Option<f64>,

    /// Start date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    start: Option<NaiveDate>,

    /// End date (YYYY-MM-DD), inclusive.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Slippage in basis points.
    #[arg(long)]
    slippage_bps: Option<f64>,

    /// Flat commission per fill.
    #[arg(long)]
    commission: Option<f64>,

    /// Use deterministic synthetic bars and forecasts when no bar file is given.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Output directory for artifacts.
    #[arg(long, default_value = "results")]
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            ticker,
            bars,
            lstm_path,
            rf_path,
            common,
        } => run_cmd(ticker, bars, lstm_path, rf_path, common),
        Commands::Compare {
            tickers,
            bars_dir,
            lstm_dir,
            rf_dir,
            sequential,
            legs,
            weights,
            common,
        } => {
            let dirs = DataDirs {
                bars: bars_dir,
                primary: lstm_dir,
                secondary: rf_dir,
            };
            compare_cmd(tickers, dirs, sequential, &legs, &weights, common)
        }
        Commands::Profiles { config } => profiles_cmd(config),
    }
}

/// Load `--config` (or start from defaults) and apply command-line overrides.
fn build_config(tickers: Vec<String>, common: &CommonArgs) -> Result<BacktestConfig> {
    let mut config = match &common.config {
        Some(path) => BacktestConfig::from_file(path)?,
        None => {
            if tickers.is_empty() {
                bail!("no tickers given (pass them on the command line or via --config)");
            }
            BacktestConfig::for_tickers(Vec::new())
        }
    };

    if !tickers.is_empty() {
        config.backtest.tickers = tickers;
    }
    let bt = &mut config.backtest;
    if let Some(strategy) = &common.strategy {
        bt.strategy = strategy.clone();
    }
    if let Some(capital) = common.capital {
        bt.initial_capital = capital;
    }
    if let Some(kind) = common.prediction_kind {
        bt.prediction_kind = kind;
    }
    if let Some(rf) = common.risk_free_rate {
        bt.risk_free_rate = rf;
    }
    if common.start.is_some() {
        bt.start_date = common.start;
    }
    if common.end.is_some() {
        bt.end_date = common.end;
    }
    if let Some(bps) = common.slippage_bps {
        config.costs.slippage_bps = bps;
    }
    if let Some(commission) = common.commission {
        config.costs.commission_per_trade = commission;
    }
    config.data.synthetic |= common.synthetic;

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run_cmd(
    ticker: Option<String>,
    bars: Option<PathBuf>,
    lstm_path: Option<PathBuf>,
    rf_path: Option<PathBuf>,
    common: CommonArgs,
) -> Result<()> {
    let config = build_config(ticker.into_iter().collect(), &common)?;
    let [ticker] = config.backtest.tickers.as_slice() else {
        bail!(
            "`run` takes exactly one ticker, config lists {} (use `compare`)",
            config.backtest.tickers.len()
        );
    };

    let mut source = config.data.source_for(ticker);
    if bars.is_some() {
        source.bars = bars;
    }
    if lstm_path.is_some() {
        source.primary = lstm_path;
    }
    if rf_path.is_some() {
        source.secondary = rf_path;
    }

    let run_id = config.run_id()?;
    info!("run {} for {ticker}", &run_id[..12]);
    let results = run_ticker(&config, &source, config.backtest.initial_capital)
        .with_context(|| format!("backtest failed for {ticker}"))?;

    print_summary(&results);
    for result in &results {
        let dir = save_artifacts(result, &common.out, Some(&run_id))?;
        println!("Artifacts saved to: {}", dir.display());
    }
    Ok(())
}

/// Per-ticker data directory overrides for `compare`.
struct DataDirs {
    bars: Option<PathBuf>,
    primary: Option<PathBuf>,
    secondary: Option<PathBuf>,
}

fn compare_cmd(
    tickers: Vec<String>,
    dirs: DataDirs,
    sequential: bool,
    legs: &[String],
    weights: &[f64],
    common: CommonArgs,
) -> Result<()> {
    let legs = if legs.is_empty() {
        if !weights.is_empty() {
            bail!("--weights needs one --leg per weight");
        }
        Vec::new()
    } else {
        PortfolioLeg::parse_all(legs, weights)?
    };
    let tickers = if tickers.is_empty() && common.config.is_none() {
        PortfolioLeg::tickers(&legs)
    } else {
        tickers
    };

    let mut config = build_config(tickers, &common)?;
    if dirs.bars.is_some() {
        config.data.bars_dir = dirs.bars;
    }
    if dirs.primary.is_some() {
        config.data.predictions_dir = dirs.primary;
    }
    if dirs.secondary.is_some() {
        config.data.secondary_dir = dirs.secondary;
    }

    let run_id = config.run_id()?;
    let comparison = run_comparison(&config, !sequential)?;

    print_summary(&comparison.results);
    println!();
    for curve in &comparison.combined {
        let m = &curve.metrics;
        println!(
            "combined {:<13} {} tickers  return {:>7.2}%  annual {:>7.2}%  sharpe {:>5.2}  max dd {:>6.2}%",
            curve.profile,
            curve.tickers.len(),
            m.total_return * 100.0,
            m.annualized_return * 100.0,
            m.sharpe,
            m.max_drawdown * 100.0,
        );
    }
    for failure in &comparison.failures {
        eprintln!("excluded {}: {}", failure.ticker, failure.reason);
    }

    save_comparison(&comparison, &common.out, Some(&run_id))?;

    if !legs.is_empty() {
        let portfolio = comparison
            .weighted(
                &legs,
                config.backtest.initial_capital,
                config.backtest.risk_free_rate,
            )
            .context("weighted portfolio")?;
        let m = &portfolio.metrics;
        let mix: Vec<String> = portfolio
            .legs
            .iter()
            .map(|l| format!("{:.1}% {}:{}", l.weight * 100.0, l.ticker, l.profile))
            .collect();
        println!(
            "weighted {}  final {:.2}  return {:>7.2}%  sharpe {:>5.2}  max dd {:>6.2}%  vol {:>6.2}%",
            mix.join(" + "),
            m.final_equity,
            m.total_return * 100.0,
            m.sharpe,
            m.max_drawdown * 100.0,
            m.annualized_volatility * 100.0,
        );
        save_weighted(&portfolio, &common.out, Some(&run_id))?;
    }

    println!("Artifacts saved to: {}", common.out.display());
    Ok(())
}

fn profiles_cmd(config: Option<PathBuf>) -> Result<()> {
    #[derive(Serialize)]
    struct ProfilesFile {
        profiles: Vec<StrategyProfile>,
    }

    let mut profiles = StrategyProfile::canonical();
    if let Some(path) = config {
        profiles.extend(BacktestConfig::from_file(&path)?.profiles);
    }
    let text = toml::to_string_pretty(&ProfilesFile { profiles })
        .context("failed to render profiles as TOML")?;
    print!("{text}");
    Ok(())
}

fn print_summary(results: &[BacktestResult]) {
    print!("{}", format_summary_table(results));
    for r in results {
        println!("  {} [{}] exits: {}", r.ticker, r.profile.name, format_exit_reasons(&r.metrics));
        if let Some(open) = &r.open_position {
            println!(
                "  {} [{}] still long {} shares since {}",
                r.ticker,
                r.profile.name,
                open.shares_held,
                open.entry_date.map(|d| d.to_string()).unwrap_or_default()
            );
        }
        if r.synthetic {
            println!("  {} [{}] SYNTHETIC DATA", r.ticker, r.profile.name);
        }
    }
}
