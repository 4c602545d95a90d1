// MACD: fast EMA minus slow EMA, an EMA of that line as the signal, and their difference
// as the histogram. A point is produced only once the signal line exists, so the input
// needs at least `slow + signal - 1` closes.

use super::moving_average::ema;
use crate::domain::Macd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

pub fn macd(closes: &[f64], params: MacdParams) -> Vec<Macd> {
    let MacdParams { fast, slow, signal } = params;
    if fast == 0 || signal == 0 || fast >= slow {
        return Vec::new();
    }

    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    if slow_ema.is_empty() {
        return Vec::new();
    }

    // fast_ema[0] is at index fast-1, slow_ema[0] at slow-1.
    let offset = slow - fast;
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();

    let signal_line = ema(&line, signal);
    signal_line
        .iter()
        .enumerate()
        .map(|(j, &sig)| {
            let l = line[j + signal - 1];
            Macd {
                line: l,
                signal: sig,
                histogram: l - sig,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_slow_plus_signal_minus_one_points() {
        let params = MacdParams::default();
        let closes: Vec<f64> = (1..=33).map(|x| x as f64).collect();
        assert!(macd(&closes, params).is_empty());

        let closes: Vec<f64> = (1..=34).map(|x| x as f64).collect();
        assert_eq!(macd(&closes, params).len(), 1);
    }

    #[test]
    fn rising_series_has_positive_line() {
        let closes: Vec<f64> = (1..=120).map(|x| (x as f64).powf(1.2)).collect();
        let last = *macd(&closes, MacdParams::default()).last().unwrap();
        assert!(last.line > 0.0);
        assert!((last.histogram - (last.line - last.signal)).abs() < 1e-12);
    }

    #[test]
    fn flat_series_is_all_zero() {
        let out = macd(&[50.0; 60], MacdParams::default());
        assert!(!out.is_empty());
        for p in out {
            assert!(p.line.abs() < 1e-12 && p.signal.abs() < 1e-12 && p.histogram.abs() < 1e-12);
        }
    }

    #[test]
    fn invalid_params_yield_nothing() {
        let closes: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        let params = MacdParams {
            fast: 26,
            slow: 12,
            signal: 9,
        };
        assert!(macd(&closes, params).is_empty());
    }
}
