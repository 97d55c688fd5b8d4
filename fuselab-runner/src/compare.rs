//! Multi-ticker comparison.
//!
//! Each ticker is an independent simulation (own ledger, own MACD latch)
//! with an equal share of the total capital, fixed up front. Tickers run in
//! parallel with rayon. Per profile, the ticker curves are summed over the
//! dates every successful ticker shares into one equal-weight portfolio.
//!
//! A ticker that fails to load or simulate is listed with its reason and
//! left out of the aggregate; the remaining tickers still run.
//!
//! Any (ticker, profile) runs can also be blended with caller-supplied
//! weights. Each leg is rescaled to the total capital on the first date all
//! legs share, then weighted, so legs funded with different capital mix in
//! the proportions asked for.

use chrono::NaiveDate;
use fuselab_core::domain::Trade;
use log::{info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::config::BacktestConfig;
use crate::metrics::PerformanceMetrics;
use crate::runner::{run_ticker, BacktestResult, RunError};

/// A ticker excluded from the comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerFailure {
    pub ticker: String,
    pub reason: String,
}

/// Equal-weight portfolio for one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedCurve {
    pub profile: String,
    pub tickers: Vec<String>,
    pub initial_capital: f64,
    pub dates: Vec<NaiveDate>,
    pub equity: Vec<f64>,
    /// Curve metrics over the combined equity; trade statistics pool every
    /// ticker's trades.
    pub metrics: PerformanceMetrics,
}

/// Everything a `compare` invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub capital_per_ticker: f64,
    pub results: Vec<BacktestResult>,
    pub combined: Vec<CombinedCurve>,
    pub failures: Vec<TickerFailure>,
}

impl Comparison {
    pub fn results_for<'a>(&'a self, profile: &'a str) -> impl Iterator<Item = &'a BacktestResult> {
        self.results.iter().filter(move |r| r.profile.name == profile)
    }

    /// The run for one ticker and profile, if it succeeded.
    pub fn result(&self, ticker: &str, profile: &str) -> Option<&BacktestResult> {
        self.results
            .iter()
            .find(|r| r.ticker == ticker && r.profile.name == profile)
    }

    /// Blend the given legs out of this comparison's runs.
    pub fn weighted(
        &self,
        legs: &[PortfolioLeg],
        initial_capital: f64,
        risk_free_rate: f64,
    ) -> Result<WeightedPortfolio, CombineError> {
        let members = legs
            .iter()
            .map(|leg| {
                self.result(&leg.ticker, &leg.profile)
                    .map(|r| (r, leg.weight))
                    .ok_or_else(|| CombineError::MissingLeg {
                        ticker: leg.ticker.clone(),
                        profile: leg.profile.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        combine_weighted(&members, initial_capital, risk_free_rate)
    }
}

/// Largest allowed distance of the weight sum from 1.
pub const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Error, PartialEq)]
pub enum CombineError {
    #[error("invalid leg {0:?}: expected TICKER:PROFILE")]
    BadLeg(String),

    #[error("{legs} legs but {weights} weights")]
    WeightCount { legs: usize, weights: usize },

    #[error("weight {0} must be finite and non-negative")]
    BadWeight(f64),

    #[error("weights sum to {0:.4}, expected 1.0")]
    WeightSum(f64),

    #[error("no result for {ticker} [{profile}]")]
    MissingLeg { ticker: String, profile: String },

    #[error("no legs to combine")]
    Empty,

    #[error("no dates shared by every leg")]
    NoCommonDates,

    #[error("{ticker} [{profile}] has non-positive equity on the first common date")]
    NonPositiveStart { ticker: String, profile: String },
}

/// One (ticker, profile) run and its share of a weighted portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLeg {
    pub ticker: String,
    pub profile: String,
    pub weight: f64,
}

impl PortfolioLeg {
    /// Parse `TICKER:PROFILE`. The ticker may itself contain dots (`0288.HK`).
    pub fn parse(text: &str, weight: f64) -> Result<Self, CombineError> {
        match text.rsplit_once(':') {
            Some((ticker, profile)) if !ticker.is_empty() && !profile.is_empty() => Ok(Self {
                ticker: ticker.to_string(),
                profile: profile.to_string(),
                weight,
            }),
            _ => Err(CombineError::BadLeg(text.to_string())),
        }
    }

    /// Pair `TICKER:PROFILE` strings with weights; no weights means equal weights.
    pub fn parse_all(texts: &[String], weights: &[f64]) -> Result<Vec<Self>, CombineError> {
        if texts.is_empty() {
            return Err(CombineError::Empty);
        }
        if !weights.is_empty() && weights.len() != texts.len() {
            return Err(CombineError::WeightCount {
                legs: texts.len(),
                weights: weights.len(),
            });
        }
        let equal = 1.0 / texts.len() as f64;
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| Self::parse(text, weights.get(i).copied().unwrap_or(equal)))
            .collect()
    }

    /// Tickers named by `legs`, first occurrence first.
    pub fn tickers(legs: &[PortfolioLeg]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        legs.iter()
            .filter(|leg| seen.insert(leg.ticker.as_str()))
            .map(|leg| leg.ticker.clone())
            .collect()
    }
}

/// Custom-weight blend of (ticker, profile) runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPortfolio {
    pub legs: Vec<PortfolioLeg>,
    pub initial_capital: f64,
    pub dates: Vec<NaiveDate>,
    pub equity: Vec<f64>,
    /// Curve metrics only; leg trades are sized on their own capital.
    pub metrics: PerformanceMetrics,
}

/// Run every configured ticker × selected profile.
///
/// Only configuration errors are fatal; per-ticker errors become failures.
pub fn run_comparison(config: &BacktestConfig, parallel: bool) -> Result<Comparison, RunError> {
    config.validate()?;
    let profiles = config.selected_profiles()?;
    let capital = config.capital_per_ticker();

    let run = |ticker: &String| {
        let outcome = run_ticker(config, &config.data.source_for(ticker), capital);
        (ticker.clone(), outcome)
    };
    let outcomes: Vec<(String, Result<Vec<BacktestResult>, RunError>)> = if parallel {
        config.backtest.tickers.par_iter().map(run).collect()
    } else {
        config.backtest.tickers.iter().map(run).collect()
    };

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for (ticker, outcome) in outcomes {
        match outcome {
            Ok(mut r) => results.append(&mut r),
            Err(e) => {
                warn!("{ticker}: excluded from comparison: {e}");
                failures.push(TickerFailure {
                    ticker,
                    reason: e.to_string(),
                });
            }
        }
    }

    let combined: Vec<CombinedCurve> = profiles
        .iter()
        .filter_map(|p| {
            let members: Vec<&BacktestResult> =
                results.iter().filter(|r| r.profile.name == p.name).collect();
            combine(&p.name, &members, config.backtest.risk_free_rate)
        })
        .collect();

    for c in &combined {
        info!(
            "combined [{}] over {} tickers: return {:.2}%, sharpe {:.2}, max dd {:.2}%",
            c.profile,
            c.tickers.len(),
            c.metrics.total_return * 100.0,
            c.metrics.sharpe,
            c.metrics.max_drawdown * 100.0
        );
    }

    Ok(Comparison {
        capital_per_ticker: capital,
        results,
        combined,
        failures,
    })
}

/// Sum the members' equity on every date all of them share.
///
/// Returns `None` when there are no members or no common dates.
pub fn combine(profile: &str, members: &[&BacktestResult], risk_free_rate: f64) -> Option<CombinedCurve> {
    if members.is_empty() {
        return None;
    }

    let mut by_date: BTreeMap<NaiveDate, (usize, f64)> = BTreeMap::new();
    for result in members {
        for snap in &result.snapshots {
            let entry = by_date.entry(snap.date).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += snap.total_equity;
        }
    }
    let (dates, equity): (Vec<NaiveDate>, Vec<f64>) = by_date
        .into_iter()
        .filter(|(_, (count, _))| *count == members.len())
        .map(|(date, (_, sum))| (date, sum))
        .unzip();
    if dates.is_empty() {
        return None;
    }

    let trades: Vec<Trade> = members.iter().flat_map(|r| r.trades.iter().cloned()).collect();
    Some(CombinedCurve {
        profile: profile.to_string(),
        tickers: members.iter().map(|r| r.ticker.clone()).collect(),
        initial_capital: members.iter().map(|r| r.initial_capital).sum(),
        metrics: PerformanceMetrics::compute(&equity, &trades, risk_free_rate),
        dates,
        equity,
    })
}

/// Blend `legs` into one curve worth `initial_capital` on the first common date.
///
/// Each leg's equity is divided by its value on that date, scaled to
/// `initial_capital` and multiplied by its weight. Weights must be finite,
/// non-negative and sum to 1 within `WEIGHT_SUM_TOLERANCE`.
pub fn combine_weighted(
    legs: &[(&BacktestResult, f64)],
    initial_capital: f64,
    risk_free_rate: f64,
) -> Result<WeightedPortfolio, CombineError> {
    if legs.is_empty() {
        return Err(CombineError::Empty);
    }
    if let Some(&(_, w)) = legs.iter().find(|(_, w)| !(w.is_finite() && *w >= 0.0)) {
        return Err(CombineError::BadWeight(w));
    }
    let total: f64 = legs.iter().map(|(_, w)| w).sum();
    if (total - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(CombineError::WeightSum(total));
    }

    let series: Vec<BTreeMap<NaiveDate, f64>> = legs
        .iter()
        .map(|(r, _)| r.snapshots.iter().map(|s| (s.date, s.total_equity)).collect())
        .collect();
    let dates: Vec<NaiveDate> = series[0]
        .keys()
        .filter(|d| series[1..].iter().all(|s| s.contains_key(*d)))
        .copied()
        .collect();
    let Some(first) = dates.first() else {
        return Err(CombineError::NoCommonDates);
    };

    let mut equity = vec![0.0; dates.len()];
    for ((result, weight), values) in legs.iter().zip(&series) {
        let base = values[first];
        if !(base > 0.0) {
            return Err(CombineError::NonPositiveStart {
                ticker: result.ticker.clone(),
                profile: result.profile.name.clone(),
            });
        }
        let scale = initial_capital * weight / base;
        for (slot, date) in equity.iter_mut().zip(&dates) {
            *slot += values[date] * scale;
        }
    }

    Ok(WeightedPortfolio {
        legs: legs
            .iter()
            .map(|(r, w)| PortfolioLeg {
                ticker: r.ticker.clone(),
                profile: r.profile.name.clone(),
                weight: *w,
            })
            .collect(),
        initial_capital,
        metrics: PerformanceMetrics::compute(&equity, &[], risk_free_rate),
        dates,
        equity,
    })
}
