//! Average True Range with Wilder smoothing.
//!
//! TR[0] = high - low; TR[i] = max(h - l, |h - C[i-1]|, |l - C[i-1]|).
//! ATR is seeded at index `window - 1` with the mean of the first `window`
//! true ranges, then ATR[i] = (ATR[i-1] * (window - 1) + TR[i]) / window.

use super::bar::PricePoint;

/// ATR per bar; `None` during warmup.
pub fn wilder_atr(bars: &[PricePoint], window: usize) -> Vec<Option<f64>> {
    if window == 0 || bars.len() < window {
        return vec![None; bars.len()];
    }

    let tr: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                bar.true_range(bars[i - 1].close)
            }
        })
        .collect();

    let mut out = Vec::with_capacity(bars.len());
    let mut prev = 0.0;
    for i in 0..bars.len() {
        if i + 1 < window {
            out.push(None);
        } else if i + 1 == window {
            prev = tr[..window].iter().sum::<f64>() / window as f64;
            out.push(Some(prev));
        } else {
            prev = (prev * (window - 1) as f64 + tr[i]) / window as f64;
            out.push(Some(prev));
        }
    }
    out
}

/// Most recent ATR value, or `None` if there is not enough history.
pub fn latest_atr(bars: &[PricePoint], window: usize) -> Option<f64> {
    wilder_atr(bars, window).last().copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_bar(day: u32, high: f64, low: f64, close: f64) -> PricePoint {
        PricePoint {
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            ticker: "TEST".into(),
            open: close,
            high,
            low,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn seed_is_average() {
        let bars = vec![
            make_bar(1, 12.0, 10.0, 11.0),
            make_bar(2, 13.0, 11.0, 12.0),
            make_bar(3, 15.0, 11.0, 14.0),
        ];
        let atr = wilder_atr(&bars, 3);
        assert_eq!(atr[0], None);
        assert_eq!(atr[1], None);
        // TRs: 2, 2, 4
        assert!((atr[2].unwrap() - 8.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn wilder_smoothing() {
        let bars = vec![
            make_bar(1, 12.0, 10.0, 11.0),
            make_bar(2, 13.0, 11.0, 12.0),
            make_bar(3, 15.0, 11.0, 14.0),
            make_bar(4, 20.0, 14.0, 19.0),
        ];
        let atr = wilder_atr(&bars, 3);
        let expected = (8.0 / 3.0 * 2.0 + 6.0) / 3.0;
        assert!((atr[3].unwrap() - expected).abs() < 1e-12);
        assert!((latest_atr(&bars, 3).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn gaps_use_previous_close() {
        let bars = vec![make_bar(1, 11.0, 10.0, 10.0), make_bar(2, 21.0, 20.0, 20.0)];
        let atr = wilder_atr(&bars, 1);
        assert!((atr[1].unwrap() - 11.0).abs() < 1e-12);
    }

    #[test]
    fn insufficient_history() {
        let bars = vec![make_bar(1, 11.0, 10.0, 10.0)];
        assert_eq!(latest_atr(&bars, 14), None);
        assert_eq!(latest_atr(&bars, 0), None);
        assert_eq!(latest_atr(&[], 14), None);
    }
}
