//! Bar and forecast loading for the runner.
//!
//! Each ticker resolves to one of two sources:
//! 1. CSV files: a bar file plus optional primary/secondary forecast files
//! 2. `synthetic`: a deterministic random walk seeded from the ticker name,
//!    with naive momentum forecasts standing in for the models
//!
//! A ticker with neither is an error. Synthetic results are tagged.

use chrono::{Datelike, NaiveDate};
use fuselab_core::domain::Bar;
use fuselab_core::fingerprint::{dataset_hash, Fingerprint};
use fuselab_core::Predictions;
use log::{debug, warn};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::TickerSource;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no bar source for '{ticker}' (set a bars file or use --synthetic)")]
    NoSource { ticker: String },

    #[error("failed to read {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{path}: row {row}: unparseable date '{value}'")]
    BadDate {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("{path}: duplicate date {date}")]
    DuplicateDate { path: PathBuf, date: NaiveDate },

    #[error("{path}: no {what} column")]
    MissingColumn { path: PathBuf, what: &'static str },

    #[error("{path}: no rows")]
    Empty { path: PathBuf },

    #[error("no bars for '{ticker}' between {start:?} and {end:?}")]
    EmptyRange {
        ticker: String,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

/// Everything one ticker's simulation consumes.
#[derive(Debug, Clone)]
pub struct TickerData {
    pub ticker: String,
    pub bars: Vec<Bar>,
    pub primary: Option<Predictions>,
    pub secondary: Option<Predictions>,
    /// BLAKE3 over the bars actually used (after the date filter).
    pub dataset_hash: Fingerprint,
    pub synthetic: bool,
}

/// Default synthetic range: three calendar years of weekdays.
pub const SYNTHETIC_START: (i32, u32, u32) = (2021, 1, 4);
pub const SYNTHETIC_END: (i32, u32, u32) = (2023, 12, 29);

/// Load one ticker's bars and forecasts, restricted to `[start, end]`.
pub fn load_ticker(
    source: &TickerSource,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<TickerData, LoadError> {
    let (bars, primary, secondary) = if let Some(path) = &source.bars {
        let bars = read_bars_csv(path)?;
        let primary = source.primary.as_deref().map(read_predictions_csv).transpose()?;
        let secondary = source
            .secondary
            .as_deref()
            .map(read_predictions_csv)
            .transpose()?;
        (bars, primary, secondary)
    } else if source.synthetic {
        warn!(
            "generating synthetic data for {}; results will be tagged as synthetic",
            source.ticker
        );
        let range = (
            start.or_else(|| ymd(SYNTHETIC_START)),
            end.or_else(|| ymd(SYNTHETIC_END)),
        );
        let (Some(from), Some(to)) = range else {
            return Err(LoadError::EmptyRange {
                ticker: source.ticker.clone(),
                start,
                end,
            });
        };
        let bars = generate_synthetic_bars(&source.ticker, from, to);
        let primary = momentum_forecast(&bars, 1);
        let secondary = momentum_forecast(&bars, 5);
        (bars, Some(primary), Some(secondary))
    } else {
        return Err(LoadError::NoSource {
            ticker: source.ticker.clone(),
        });
    };

    let bars = filter_range(bars, start, end);
    if bars.is_empty() {
        return Err(LoadError::EmptyRange {
            ticker: source.ticker.clone(),
            start,
            end,
        });
    }
    debug!(
        "{}: {} bars {} .. {}",
        source.ticker,
        bars.len(),
        bars[0].date,
        bars[bars.len() - 1].date
    );

    Ok(TickerData {
        ticker: source.ticker.clone(),
        dataset_hash: dataset_hash(&bars),
        bars,
        primary,
        secondary,
        synthetic: source.bars.is_none(),
    })
}

fn ymd((y, m, d): (i32, u32, u32)) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Keep bars inside the inclusive range.
pub fn filter_range(bars: Vec<Bar>, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<Bar> {
    bars.into_iter()
        .filter(|b| start.map_or(true, |s| b.date >= s) && end.map_or(true, |e| b.date <= e))
        .collect()
}

// ─── CSV ────────────────────────────────────────────────────────────

/// One bar row. Accepts lowercase or capitalized headers; extra columns
/// (`Adj Close`, `Dividends`, ...) are ignored.
#[derive(Debug, Deserialize)]
struct BarRecord {
    #[serde(alias = "Date", alias = "timestamp")]
    date: String,
    #[serde(alias = "Open", default)]
    open: Option<f64>,
    #[serde(alias = "High", default)]
    high: Option<f64>,
    #[serde(alias = "Low", default)]
    low: Option<f64>,
    #[serde(alias = "Close", default)]
    close: Option<f64>,
    #[serde(alias = "Volume", default)]
    volume: Option<f64>,
}

/// Parse `YYYY-MM-DD`, ignoring any time suffix.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Read a bar file, sorted by date.
///
/// An empty close becomes NaN so the day is marked invalid downstream
/// instead of dropped; missing open/high/low fall back to the close.
pub fn read_bars_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;

    let mut bars = Vec::new();
    for (i, record) in reader.deserialize::<BarRecord>().enumerate() {
        let record = record.map_err(csv_err)?;
        let date = parse_date(&record.date).ok_or_else(|| LoadError::BadDate {
            path: path.to_path_buf(),
            row: i + 1,
            value: record.date.clone(),
        })?;
        let close = record.close.unwrap_or(f64::NAN);
        bars.push(Bar {
            date,
            open: record.open.unwrap_or(close),
            high: record.high.unwrap_or(close),
            low: record.low.unwrap_or(close),
            close,
            volume: record.volume.filter(|v| v.is_finite() && *v > 0.0).unwrap_or(0.0) as u64,
        });
    }
    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    bars.sort_by_key(|b| b.date);
    if let Some(pair) = bars.windows(2).find(|w| w[0].date == w[1].date) {
        return Err(LoadError::DuplicateDate {
            path: path.to_path_buf(),
            date: pair[0].date,
        });
    }
    Ok(bars)
}

const PREDICTION_COLUMNS: [&str; 4] = ["prediction", "predicted", "forecast", "predicted_close"];

/// Read a forecast file: a date column and a value column.
///
/// The value column is the first header named like a prediction, otherwise
/// the last column. Empty or non-numeric values are treated as missing.
pub fn read_predictions_csv(path: &Path) -> Result<Predictions, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };

    let date_col = find(&["date", "timestamp"][..]).unwrap_or(0);
    let value_col = find(&PREDICTION_COLUMNS[..])
        .or_else(|| headers.len().checked_sub(1))
        .filter(|&c| c != date_col)
        .ok_or(LoadError::MissingColumn {
            path: path.to_path_buf(),
            what: "prediction",
        })?;

    let mut predictions = Predictions::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(csv_err)?;
        let raw_date = record.get(date_col).unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| LoadError::BadDate {
            path: path.to_path_buf(),
            row: i + 1,
            value: raw_date.to_string(),
        })?;
        let value = record
            .get(value_col)
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite());
        match value {
            Some(v) => {
                predictions.insert(date, v);
            }
            None => debug!("{}: no forecast for {date}", path.display()),
        }
    }
    Ok(predictions)
}

// ─── Synthetic ──────────────────────────────────────────────────────

/// Weekday random walk from 100.0, seeded from the ticker name.
///
/// Same ticker and range always give the same bars.
pub fn generate_synthetic_bars(ticker: &str, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let seed: [u8; 32] = *blake3::hash(ticker.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += chrono::Duration::days(1);
            continue;
        }

        // Slight upward drift so trend filters have something to find.
        let daily_return: f64 = rng.gen_range(-0.025..0.027);
        let open = price;
        let close = (price * (1.0 + daily_return)).max(1.0);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64);

        bars.push(Bar {
            date: current,
            open,
            high,
            low,
            close,
            volume,
        });

        price = close;
        current += chrono::Duration::days(1);
    }

    bars
}

/// Naive price forecast: tomorrow's close extrapolates the mean daily change
/// over the last `lookback` bars. Uses only data up to each bar.
pub fn momentum_forecast(bars: &[Bar], lookback: usize) -> Predictions {
    let lookback = lookback.max(1);
    bars.iter()
        .enumerate()
        .skip(lookback)
        .filter(|(_, b)| b.has_tradable_close())
        .filter_map(|(i, bar)| {
            let past = &bars[i - lookback];
            past.has_tradable_close().then(|| {
                let step = (bar.close - past.close) / lookback as f64;
                (bar.date, bar.close + step)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn reads_capitalized_headers_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "AAPL.csv",
            "Date,Open,High,Low,Close,Adj Close,Volume\n\
             2024-01-03 00:00:00-05:00,101,103,100,102,102,1100\n\
             2024-01-02,100,102,99,101,101,1000.0\n",
        );
        let bars = read_bars_csv(&path).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d(2024, 1, 2));
        assert_eq!(bars[1].close, 102.0);
        assert_eq!(bars[0].volume, 1000);
    }

    #[test]
    fn empty_close_becomes_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "X.csv",
            "date,open,high,low,close,volume\n2024-01-02,1,1,1,,5\n",
        );
        let bars = read_bars_csv(&path).unwrap();
        assert!(bars[0].close.is_nan());
        assert!(!bars[0].has_tradable_close());
    }

    #[test]
    fn rejects_duplicate_and_bad_dates() {
        let dir = tempfile::tempdir().unwrap();
        let dup = write_file(
            &dir,
            "dup.csv",
            "date,close\n2024-01-02,1\n2024-01-02,2\n",
        );
        assert!(matches!(
            read_bars_csv(&dup),
            Err(LoadError::DuplicateDate { .. })
        ));
        let bad = write_file(&dir, "bad.csv", "date,close\nyesterday,1\n");
        assert!(matches!(
            read_bars_csv(&bad),
            Err(LoadError::BadDate { row: 1, .. })
        ));
    }

    #[test]
    fn reads_prediction_column_by_name_or_position() {
        let dir = tempfile::tempdir().unwrap();
        let named = write_file(
            &dir,
            "named.csv",
            "Date,prediction,actual\n2024-01-02,101.5,101\n2024-01-03,,102\n",
        );
        let preds = read_predictions_csv(&named).unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[&d(2024, 1, 2)], 101.5);

        let positional = write_file(&dir, "pos.csv", "day,value\n2024-01-02,0.7\n");
        let preds = read_predictions_csv(&positional).unwrap();
        assert_eq!(preds[&d(2024, 1, 2)], 0.7);
    }

    #[test]
    fn prediction_file_needs_two_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "one.csv", "date\n2024-01-02\n");
        assert!(matches!(
            read_predictions_csv(&path),
            Err(LoadError::MissingColumn { .. })
        ));
    }

    #[test]
    fn synthetic_bars_are_deterministic_weekdays() {
        let a = generate_synthetic_bars("SPY", d(2024, 1, 1), d(2024, 3, 31));
        let b = generate_synthetic_bars("SPY", d(2024, 1, 1), d(2024, 3, 31));
        let c = generate_synthetic_bars("QQQ", d(2024, 1, 1), d(2024, 3, 31));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|bar| bar.date.weekday().number_from_monday() <= 5));
        assert!(a.iter().all(|bar| bar.is_sane()));
    }

    #[test]
    fn momentum_forecast_uses_only_past_bars() {
        let bars = generate_synthetic_bars("IBM", d(2024, 1, 1), d(2024, 2, 29));
        let full = momentum_forecast(&bars, 3);
        let truncated = momentum_forecast(&bars[..20], 3);
        for (date, value) in &truncated {
            assert_eq!(full[date], *value);
        }
        assert_eq!(full.len(), bars.len() - 3);
        assert!(!full.contains_key(&bars[2].date));
    }

    #[test]
    fn load_ticker_filters_range_and_tags_synthetic() {
        let source = TickerSource {
            ticker: "SPY".into(),
            bars: None,
            primary: None,
            secondary: None,
            synthetic: true,
        };
        let data = load_ticker(&source, Some(d(2022, 1, 3)), Some(d(2022, 12, 30))).unwrap();
        assert!(data.synthetic);
        assert!(data.primary.is_some() && data.secondary.is_some());
        assert_eq!(data.bars.first().unwrap().date, d(2022, 1, 3));
        assert_eq!(data.bars.last().unwrap().date, d(2022, 12, 30));
    }

    #[test]
    fn load_ticker_without_source_fails() {
        let source = TickerSource {
            ticker: "SPY".into(),
            bars: None,
            primary: None,
            secondary: None,
            synthetic: false,
        };
        assert!(matches!(
            load_ticker(&source, None, None),
            Err(LoadError::NoSource { .. })
        ));
    }

    #[test]
    fn load_ticker_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let bars = write_file(
            &dir,
            "bars.csv",
            "date,open,high,low,close,volume\n\
             2024-01-02,10,11,9,10,100\n\
             2024-01-03,10,11,9,10.5,100\n\
             2024-01-04,10,11,9,10.2,100\n",
        );
        let lstm = write_file(&dir, "lstm.csv", "date,prediction\n2024-01-03,10.9\n");
        let source = TickerSource {
            ticker: "T".into(),
            bars: Some(bars),
            primary: Some(lstm),
            secondary: None,
            synthetic: true,
        };
        let data = load_ticker(&source, Some(d(2024, 1, 3)), None).unwrap();
        assert!(!data.synthetic);
        assert_eq!(data.bars.len(), 2);
        assert_eq!(data.primary.unwrap().len(), 1);
        assert!(data.secondary.is_none());
        assert_eq!(data.dataset_hash, dataset_hash(&data.bars));
    }
}
