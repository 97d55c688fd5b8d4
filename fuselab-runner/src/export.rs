//! Reporting and export: JSON and CSV artifact generation.
//!
//! One directory per ticker × profile run:
//! - `trades.csv`: the trade log
//! - `portfolio_history.csv`: the daily equity curve
//! - `summary.json`: strategy and buy-and-hold metrics
//! - `manifest.json`: provenance and fingerprints
//!
//! A comparison adds `combined_{profile}.csv` and `comparison.json`; a
//! custom-weight portfolio adds `weighted_portfolio.csv` and
//! `weighted_portfolio.json`.
//!
//! All persisted JSON carries a `schema_version`. Unknown versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use fuselab_core::domain::{ExitReason, PortfolioSnapshot, PositionState, Trade};
use fuselab_core::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};

use crate::compare::{CombinedCurve, Comparison, WeightedPortfolio};
use crate::metrics::PerformanceMetrics;
use crate::runner::{BacktestResult, SCHEMA_VERSION};

/// Provenance record written next to every run's artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub ticker: String,
    pub profile: String,
    pub exit_rule: String,
    pub initial_capital: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: usize,
    pub warmup_bars: usize,
    pub synthetic: bool,
    pub run_id: Option<String>,
    pub dataset_hash: Fingerprint,
    pub profile_hash: Fingerprint,
    pub output_fingerprint: Fingerprint,
    pub files: Vec<String>,
}

/// Headline numbers for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub schema_version: u32,
    pub ticker: String,
    pub profile: String,
    pub metrics: PerformanceMetrics,
    pub benchmark: PerformanceMetrics,
    pub open_position: Option<PositionState>,
    pub skipped_entries: usize,
    pub day_issues: usize,
}

const FILES: [&str; 4] = [
    "trades.csv",
    "portfolio_history.csv",
    "summary.json",
    "manifest.json",
];

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

pub fn summary_of(result: &BacktestResult) -> Summary {
    Summary {
        schema_version: SCHEMA_VERSION,
        ticker: result.ticker.clone(),
        profile: result.profile.name.clone(),
        metrics: result.metrics.clone(),
        benchmark: result.benchmark.clone(),
        open_position: result.open_position.clone(),
        skipped_entries: result.skipped_entries(),
        day_issues: result.issues.len(),
    }
}

pub fn manifest_of(result: &BacktestResult, run_id: Option<&str>) -> Manifest {
    Manifest {
        schema_version: SCHEMA_VERSION,
        ticker: result.ticker.clone(),
        profile: result.profile.name.clone(),
        exit_rule: result.profile.exit_rule.to_string(),
        initial_capital: result.initial_capital,
        start_date: result.start_date,
        end_date: result.end_date,
        bar_count: result.bar_count,
        warmup_bars: result.warmup_bars,
        synthetic: result.synthetic,
        run_id: run_id.map(str::to_string),
        dataset_hash: result.dataset_hash.clone(),
        profile_hash: result.profile_hash.clone(),
        output_fingerprint: result.output_fingerprint.clone(),
        files: FILES.iter().map(|f| f.to_string()).collect(),
    }
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: entry_date, entry_price, exit_date, exit_price, shares, pnl,
/// commission, net_pnl, return_pct, bars_held, exit_reason
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "entry_date",
        "entry_price",
        "exit_date",
        "exit_price",
        "shares",
        "pnl",
        "commission",
        "net_pnl",
        "return_pct",
        "bars_held",
        "exit_reason",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.entry_date.to_string(),
            &format!("{:.6}", t.entry_price),
            &t.exit_date.to_string(),
            &format!("{:.6}", t.exit_price),
            &t.shares.to_string(),
            &format!("{:.2}", t.pnl),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.net_pnl),
            &format!("{:.6}", t.return_pct()),
            &t.bars_held.to_string(),
            &t.exit_reason.to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the daily portfolio history: date, cash, position_value, total_equity.
pub fn export_history_csv(snapshots: &[PortfolioSnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "cash", "position_value", "total_equity"])?;
    for s in snapshots {
        wtr.write_record([
            &s.date.to_string(),
            &format!("{:.2}", s.cash),
            &format!("{:.2}", s.position_value),
            &format!("{:.2}", s.total_equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equal-weight curve: date, total_equity.
pub fn export_combined_csv(curve: &CombinedCurve) -> Result<String> {
    export_curve_csv(&curve.dates, &curve.equity)
}

pub fn export_weighted_csv(portfolio: &WeightedPortfolio) -> Result<String> {
    export_curve_csv(&portfolio.dates, &portfolio.equity)
}

fn export_curve_csv(dates: &[NaiveDate], equity: &[f64]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "total_equity"])?;
    for (date, equity) in dates.iter().zip(equity) {
        wtr.write_record([&date.to_string(), &format!("{:.2}", equity)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}

/// Directory name for one run: `{ticker}_{profile}`.
pub fn run_dir_name(result: &BacktestResult) -> String {
    format!("{}_{}", result.ticker, result.profile.name)
}

/// Save the full artifact set for a single run under `output_dir`.
///
/// Returns the path to the created directory.
pub fn save_artifacts(
    result: &BacktestResult,
    output_dir: &Path,
    run_id: Option<&str>,
) -> Result<PathBuf> {
    let run_dir = output_dir.join(run_dir_name(result));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write_text(&run_dir.join("trades.csv"), &export_trades_csv(&result.trades)?)?;
    write_text(
        &run_dir.join("portfolio_history.csv"),
        &export_history_csv(&result.snapshots)?,
    )?;
    write_json(&run_dir.join("summary.json"), &summary_of(result))?;
    write_json(&run_dir.join("manifest.json"), &manifest_of(result, run_id))?;

    Ok(run_dir)
}

/// Save every run of a comparison plus one `combined_{profile}.csv` per
/// profile and `comparison.json` (combined metrics and failures).
pub fn save_comparison(
    comparison: &Comparison,
    output_dir: &Path,
    run_id: Option<&str>,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let mut dirs = Vec::with_capacity(comparison.results.len());
    for result in &comparison.results {
        dirs.push(save_artifacts(result, output_dir, run_id)?);
    }

    for curve in &comparison.combined {
        let path = output_dir.join(format!("combined_{}.csv", curve.profile));
        write_text(&path, &export_combined_csv(curve)?)?;
    }

    #[derive(Serialize)]
    struct ComparisonFile<'a> {
        schema_version: u32,
        run_id: Option<&'a str>,
        capital_per_ticker: f64,
        combined: Vec<CombinedSummary<'a>>,
        runs: Vec<Summary>,
        failures: &'a [crate::compare::TickerFailure],
    }
    #[derive(Serialize)]
    struct CombinedSummary<'a> {
        profile: &'a str,
        tickers: &'a [String],
        initial_capital: f64,
        metrics: &'a PerformanceMetrics,
    }

    let file = ComparisonFile {
        schema_version: SCHEMA_VERSION,
        run_id,
        capital_per_ticker: comparison.capital_per_ticker,
        combined: comparison
            .combined
            .iter()
            .map(|c| CombinedSummary {
                profile: &c.profile,
                tickers: &c.tickers,
                initial_capital: c.initial_capital,
                metrics: &c.metrics,
            })
            .collect(),
        runs: comparison.results.iter().map(summary_of).collect(),
        failures: &comparison.failures,
    };
    write_json(&output_dir.join("comparison.json"), &file)?;

    Ok(dirs)
}

/// Save a custom-weight portfolio as `weighted_portfolio.csv` and
/// `weighted_portfolio.json`. Returns the JSON path.
pub fn save_weighted(
    portfolio: &WeightedPortfolio,
    output_dir: &Path,
    run_id: Option<&str>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    write_text(
        &output_dir.join("weighted_portfolio.csv"),
        &export_weighted_csv(portfolio)?,
    )?;

    #[derive(Serialize)]
    struct WeightedFile<'a> {
        schema_version: u32,
        run_id: Option<&'a str>,
        legs: &'a [crate::compare::PortfolioLeg],
        initial_capital: f64,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        final_value: Option<f64>,
        metrics: &'a PerformanceMetrics,
    }

    let path = output_dir.join("weighted_portfolio.json");
    write_json(
        &path,
        &WeightedFile {
            schema_version: SCHEMA_VERSION,
            run_id,
            legs: &portfolio.legs,
            initial_capital: portfolio.initial_capital,
            start_date: portfolio.dates.first().copied(),
            end_date: portfolio.dates.last().copied(),
            final_value: portfolio.equity.last().copied(),
            metrics: &portfolio.metrics,
        },
    )?;
    Ok(path)
}

/// Read back the summary of a saved run, rejecting unknown schema versions.
pub fn load_summary(dir: &Path) -> Result<Summary> {
    let path = dir.join("summary.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let summary: Summary = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

// ─── Text report ────────────────────────────────────────────────────

/// Side-by-side table of runs, one row per ticker × profile.
pub fn format_summary_table(results: &[BacktestResult]) -> String {
    let mut out = String::with_capacity(256 + results.len() * 128);
    out.push_str(&format!(
        "{:<8} {:<13} {:>7} {:>9} {:>9} {:>8} {:>8} {:>9} {:>9}\n",
        "ticker", "profile", "trades", "return", "annual", "sharpe", "max dd", "win rate", "b&h"
    ));
    for r in results {
        let m = &r.metrics;
        out.push_str(&format!(
            "{:<8} {:<13} {:>7} {:>8.2}% {:>8.2}% {:>8.2} {:>7.2}% {:>8.1}% {:>8.2}%\n",
            r.ticker,
            r.profile.name,
            m.trade_count,
            m.total_return * 100.0,
            m.annualized_return * 100.0,
            m.sharpe,
            m.max_drawdown * 100.0,
            m.win_rate * 100.0,
            r.benchmark.total_return * 100.0,
        ));
    }
    out
}

/// Exit reason breakdown, e.g. `stop_loss=3 trailing_stop=1 ml_bearish=0 take_profit=2`.
pub fn format_exit_reasons(metrics: &PerformanceMetrics) -> String {
    ExitReason::ALL
        .iter()
        .map(|r| format!("{}={}", r, metrics.exit_reasons.get(r).copied().unwrap_or(0)))
        .collect::<Vec<_>>()
        .join(" ")
}
