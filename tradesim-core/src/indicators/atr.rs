//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing (alpha = 1/period), seeded with the mean of the
//! first `period` true ranges that have a previous close.

use crate::domain::Bar;

/// True Range series. TR[0] is NaN: the first bar has no previous close.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let mut tr = vec![f64::NAN; bars.len()];
    for i in 1..bars.len() {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }
    tr
}

/// Wilder smoothing. NaN until `period` consecutive finite values have been seen;
/// a non-finite input restarts the seed window.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    if period == 0 {
        return result;
    }

    let alpha = 1.0 / period as f64;
    let mut window_sum = 0.0;
    let mut window_len = 0usize;
    let mut prev: Option<f64> = None;

    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            window_sum = 0.0;
            window_len = 0;
            prev = None;
            continue;
        }
        match prev {
            Some(p) => {
                let smoothed = alpha * v + (1.0 - alpha) * p;
                result[i] = smoothed;
                prev = Some(smoothed);
            }
            None => {
                window_sum += v;
                window_len += 1;
                if window_len == period {
                    let seed = window_sum / period as f64;
                    result[i] = seed;
                    prev = Some(seed);
                }
            }
        }
    }

    result
}

/// ATR series for `bars`. The first `period` entries are NaN.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    wilder_smooth(&true_range(bars), period)
}

/// Fill in `Bar::atr` wherever the source left it NaN.
///
/// Bars that already carry an ATR keep it; upstream values win.
pub fn annotate_atr(bars: &mut [Bar], period: usize) {
    let computed = atr(bars, period);
    for (bar, value) in bars.iter_mut().zip(computed) {
        if bar.atr.is_nan() {
            bar.atr = value;
        }
    }
}
