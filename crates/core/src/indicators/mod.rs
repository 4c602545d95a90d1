// =============================================================================
// Indicator Calculator
// =============================================================================
//
// Pure functions over oldest-first price series. Every series function returns an empty
// vector when the input is shorter than its window; callers decide what "unavailable"
// means for them (see `latest_rsi` / `latest_macd` for the snapshot defaults).

pub mod candles;
pub mod levels;
pub mod macd;
pub mod moving_average;
pub mod rsi;

use crate::domain::Macd;
pub use macd::MacdParams;

/// RSI reported when there is not enough history to compute one.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Window lengths used when building a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorPeriods {
    pub sma_mid: usize,
    pub ema_short: usize,
    pub sma_long: usize,
    pub rsi: usize,
    pub macd: MacdParams,
    pub levels: usize,
    pub avg_volume: usize,
    /// Most recent sessions considered from the upstream series.
    pub max_bars: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            sma_mid: 50,
            ema_short: 20,
            sma_long: 200,
            rsi: 14,
            macd: MacdParams::default(),
            levels: 20,
            avg_volume: 20,
            max_bars: 250,
        }
    }
}

/// Fixed-signature indicator interface used by the sync pipeline.
pub trait IndicatorCalculator: Send + Sync {
    fn sma(&self, closes: &[f64], period: usize) -> Vec<f64>;
    fn ema(&self, closes: &[f64], period: usize) -> Vec<f64>;
    fn rsi(&self, closes: &[f64], period: usize) -> Vec<f64>;
    fn macd(&self, closes: &[f64], params: MacdParams) -> Vec<Macd>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardIndicators;

impl IndicatorCalculator for StandardIndicators {
    fn sma(&self, closes: &[f64], period: usize) -> Vec<f64> {
        moving_average::sma(closes, period)
    }

    fn ema(&self, closes: &[f64], period: usize) -> Vec<f64> {
        moving_average::ema(closes, period)
    }

    fn rsi(&self, closes: &[f64], period: usize) -> Vec<f64> {
        rsi::rsi(closes, period)
    }

    fn macd(&self, closes: &[f64], params: MacdParams) -> Vec<Macd> {
        macd::macd(closes, params)
    }
}

pub fn latest_rsi(series: &[f64]) -> f64 {
    series.last().copied().unwrap_or(NEUTRAL_RSI)
}

pub fn latest_macd(series: &[Macd]) -> Macd {
    series.last().copied().unwrap_or_default()
}
