//! Bar loading for the runner.
//!
//! Reads a CSV file into a validated `BarSeries`. Column names are matched
//! case-insensitively:
//!
//! | column | aliases | required |
//! |---|---|---|
//! | timestamp | `date`, `datetime`, `time` | yes |
//! | open, high, low, close | | yes |
//! | volume | | no (0) |
//! | atr | | no (computed with Wilder smoothing) |
//! | signal | `direction`, `prediction` | no (flat) |
//! | confidence | `votes`, `score` | no (1 for a bare signal) |
//! | anomaly | `is_anomaly` | no (false) |
//!
//! Any other numeric column is kept as a named indicator.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info};

use tradesim_core::domain::{Bar, EnsembleSignal, SignalDirection};
use tradesim_core::fingerprint::DatasetHash;
use tradesim_core::indicators::annotate_atr;
use tradesim_core::{BarSeries, DataError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("'{path}' has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("'{path}' line {line}: cannot parse {column} value '{value}'")]
    Parse {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },
    #[error("'{path}' contains no bars")]
    Empty { path: PathBuf },
    #[error("invalid synthetic data config: {0}")]
    Synthetic(String),
    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Options controlling how bars are loaded.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Period used when the file has no ATR column (or the column has gaps).
    pub atr_period: usize,
    /// Sort rows by timestamp before validation instead of rejecting unordered files.
    pub sort: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            atr_period: 14,
            sort: false,
        }
    }
}

/// Result of loading bars, including provenance.
#[derive(Debug)]
pub struct LoadedData {
    pub series: BarSeries,
    /// BLAKE3 over all bar data, for fingerprinting.
    pub dataset_hash: DatasetHash,
    /// Whether the bars were generated rather than read.
    pub synthetic: bool,
    /// File the bars came from.
    pub source: Option<PathBuf>,
}

impl LoadedData {
    pub fn from_series(series: BarSeries, synthetic: bool, source: Option<PathBuf>) -> Self {
        Self {
            dataset_hash: DatasetHash::of(&series),
            series,
            synthetic,
            source,
        }
    }
}

/// Column positions resolved from the header row.
struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    atr: Option<usize>,
    signal: Option<usize>,
    confidence: Option<usize>,
    anomaly: Option<usize>,
    extras: Vec<(usize, String)>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord, path: &Path) -> Result<Self, LoadError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));
        let require = |column: &'static str, aliases: &[&str]| {
            find(aliases).ok_or_else(|| LoadError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })
        };

        let mut columns = Columns {
            timestamp: require("timestamp", &["timestamp", "date", "datetime", "time"])?,
            open: require("open", &["open"])?,
            high: require("high", &["high"])?,
            low: require("low", &["low"])?,
            close: require("close", &["close"])?,
            volume: find(&["volume"]),
            atr: find(&["atr"]),
            signal: find(&["signal", "direction", "prediction"]),
            confidence: find(&["confidence", "votes", "score"]),
            anomaly: find(&["anomaly", "is_anomaly"]),
            extras: Vec::new(),
        };
        let known = [
            Some(columns.timestamp),
            Some(columns.open),
            Some(columns.high),
            Some(columns.low),
            Some(columns.close),
            columns.volume,
            columns.atr,
            columns.signal,
            columns.confidence,
            columns.anomaly,
        ];
        columns.extras = names
            .iter()
            .enumerate()
            .filter(|(i, _)| !known.contains(&Some(*i)))
            .map(|(i, n)| (i, n.clone()))
            .collect();
        Ok(columns)
    }
}

/// Load a CSV file into a validated series. Missing ATR values are filled in.
pub fn load_csv(path: &Path, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;
    let headers = reader.headers().map_err(csv_err)?.clone();
    let columns = Columns::resolve(&headers, path)?;

    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        bars.push(parse_row(&record, &columns, &headers, path, line)?);
    }
    if bars.is_empty() {
        return Err(LoadError::Empty {
            path: path.to_path_buf(),
        });
    }

    if opts.sort {
        bars.sort_by_key(|b| b.timestamp);
    }
    let missing_atr = bars.iter().filter(|b| b.atr.is_nan()).count();
    if missing_atr > 0 {
        debug!(missing = missing_atr, period = opts.atr_period, "filling ATR");
        annotate_atr(&mut bars, opts.atr_period);
    }

    let series = BarSeries::new(bars)?;
    info!(
        path = %path.display(),
        bars = series.len(),
        "loaded bars"
    );
    Ok(LoadedData::from_series(series, false, Some(path.to_path_buf())))
}

fn parse_row(
    record: &csv::StringRecord,
    columns: &Columns,
    headers: &csv::StringRecord,
    path: &Path,
    line: u64,
) -> Result<Bar, LoadError> {
    let field = |index: usize| record.get(index).unwrap_or("");
    let parse_error = |index: usize| LoadError::Parse {
        path: path.to_path_buf(),
        line,
        column: headers.get(index).unwrap_or("?").to_string(),
        value: field(index).to_string(),
    };
    let number = |index: usize| field(index).parse::<f64>().map_err(|_| parse_error(index));
    let optional = |index: Option<usize>| -> Result<Option<f64>, LoadError> {
        match index {
            Some(i) if !field(i).is_empty() => number(i).map(Some),
            _ => Ok(None),
        }
    };

    let timestamp =
        parse_timestamp(field(columns.timestamp)).ok_or_else(|| parse_error(columns.timestamp))?;
    let mut bar = Bar::new(
        timestamp,
        number(columns.open)?,
        number(columns.high)?,
        number(columns.low)?,
        number(columns.close)?,
    );
    bar.volume = optional(columns.volume)?.unwrap_or(0.0);
    bar.atr = optional(columns.atr)?.unwrap_or(f64::NAN);

    let direction = match columns.signal {
        Some(i) => parse_direction(field(i)).ok_or_else(|| parse_error(i))?,
        None => SignalDirection::Flat,
    };
    let confidence = optional(columns.confidence)?.unwrap_or(match direction {
        SignalDirection::Flat => 0.0,
        _ => 1.0,
    });
    bar.signal = EnsembleSignal::new(direction, confidence);

    if let Some(i) = columns.anomaly {
        bar.anomaly = parse_flag(field(i)).ok_or_else(|| parse_error(i))?;
    }

    let mut indicators = BTreeMap::new();
    for (i, name) in &columns.extras {
        if let Ok(value) = field(*i).parse::<f64>() {
            indicators.insert(name.clone(), value);
        }
    }
    bar.indicators = indicators;
    Ok(bar)
}

/// Accepts ISO dates and datetimes, RFC 3339, and unix epochs in seconds or milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    let epoch: i64 = raw.parse().ok()?;
    // Anything past 10^11 cannot be seconds for a plausible date: treat it as millis.
    let dt = if epoch.abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(epoch)?
    } else {
        DateTime::from_timestamp(epoch, 0)?
    };
    Some(dt.naive_utc())
}

/// `long`/`buy`/`1`, `short`/`sell`/`-1`, `flat`/`hold`/`0`/empty.
pub fn parse_direction(raw: &str) -> Option<SignalDirection> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "long" | "buy" | "1" | "+1" => Some(SignalDirection::Long),
        "short" | "sell" | "-1" => Some(SignalDirection::Short),
        "flat" | "hold" | "none" | "0" | "" => Some(SignalDirection::Flat),
        _ => None,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" | "" => Some(false),
        _ => None,
    }
}
