//! BarSeries: the validated, immutable input to a run.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::domain::Bar;

/// Malformed input data. Carries the offending bar's index and timestamp.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("bar {index} ({timestamp}): timestamp not after previous bar ({previous})")]
    NonMonotonicTimestamp {
        index: usize,
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },
    #[error("bar {index} ({timestamp}): {field} is not finite")]
    NonFinite {
        index: usize,
        timestamp: NaiveDateTime,
        field: &'static str,
    },
    #[error("bar {index} ({timestamp}): {field} must be positive, got {value}")]
    NonPositivePrice {
        index: usize,
        timestamp: NaiveDateTime,
        field: &'static str,
        value: f64,
    },
    #[error(
        "bar {index} ({timestamp}): inconsistent OHLC (open={open}, high={high}, low={low}, close={close})"
    )]
    InconsistentOhlc {
        index: usize,
        timestamp: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
    #[error("bar {index} ({timestamp}): volume must be >= 0, got {volume}")]
    NegativeVolume {
        index: usize,
        timestamp: NaiveDateTime,
        volume: f64,
    },
    #[error("bar {index} ({timestamp}): atr must be >= 0 or NaN, got {atr}")]
    NegativeAtr {
        index: usize,
        timestamp: NaiveDateTime,
        atr: f64,
    },
}

impl DataError {
    /// Index of the bar that failed validation.
    pub fn index(&self) -> usize {
        match self {
            DataError::NonMonotonicTimestamp { index, .. }
            | DataError::NonFinite { index, .. }
            | DataError::NonPositivePrice { index, .. }
            | DataError::InconsistentOhlc { index, .. }
            | DataError::NegativeVolume { index, .. }
            | DataError::NegativeAtr { index, .. } => *index,
        }
    }
}

/// Time-ordered bars, validated once on construction and read-only afterwards.
///
/// Construction fails on the first bad bar. Nothing is repaired or skipped:
/// dropping a bar silently would shift every later bar index.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self, DataError> {
        let mut previous: Option<NaiveDateTime> = None;
        for (index, bar) in bars.iter().enumerate() {
            if let Some(prev) = previous {
                if bar.timestamp <= prev {
                    return Err(DataError::NonMonotonicTimestamp {
                        index,
                        timestamp: bar.timestamp,
                        previous: prev,
                    });
                }
            }
            bar.validate(index)?;
            previous = Some(bar.timestamp);
        }
        Ok(Self { bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}

impl<'a> IntoIterator for &'a BarSeries {
    type Item = &'a Bar;
    type IntoIter = std::slice::Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bar_at(day: i64, close: f64) -> Bar {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(day);
        Bar::new(ts, close, close + 1.0, close - 1.0, close).with_atr(1.0)
    }

    #[test]
    fn empty_series_is_valid() {
        let series = BarSeries::new(Vec::new()).unwrap();
        assert!(series.is_empty());
        assert!(series.last().is_none());
    }

    #[test]
    fn ordered_series_is_valid() {
        let series = BarSeries::new(vec![bar_at(0, 10.0), bar_at(1, 11.0)]).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.iter().count(), 2);
        assert_eq!(series.get(1).unwrap().close, 11.0);
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let err = BarSeries::new(vec![bar_at(0, 10.0), bar_at(1, 11.0), bar_at(1, 12.0)])
            .unwrap_err();
        assert!(matches!(err, DataError::NonMonotonicTimestamp { index: 2, .. }));
        assert_eq!(err.index(), 2);
    }

    #[test]
    fn backwards_timestamp_rejected() {
        let err = BarSeries::new(vec![bar_at(3, 10.0), bar_at(2, 11.0)]).unwrap_err();
        assert_eq!(err.index(), 1);
    }

    #[test]
    fn bad_bar_reports_its_index() {
        let mut bad = bar_at(2, 12.0);
        bad.low = 13.0;
        let err = BarSeries::new(vec![bar_at(0, 10.0), bar_at(1, 11.0), bad]).unwrap_err();
        assert!(matches!(err, DataError::InconsistentOhlc { index: 2, .. }));
        assert!(err.to_string().contains("bar 2"));
    }
}
