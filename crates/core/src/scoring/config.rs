//! Versioned scoring table. Every threshold and point delta the rule groups use lives
//! here so a revision is a data change, not a code change.

use anyhow::{bail, ensure};
use serde::Serialize;

/// Summed-score cutoffs, evaluated highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalLadder {
    pub strong_buy: i32,
    pub buy: i32,
    pub sell: i32,
    pub strong_sell: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringConfig {
    pub revision: &'static str,

    pub trend_short_above: i32,
    pub trend_short_below: i32,
    pub trend_long_above: i32,
    pub trend_long_below: i32,

    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold_delta: i32,
    pub rsi_overbought_delta: i32,

    pub macd_bullish: i32,
    pub macd_bearish: i32,

    pub volume_up: i32,
    pub volume_down: i32,

    pub pattern_each: i32,
    pub candle_each: i32,

    /// Relative distance to support that counts as "testing" it.
    pub support_proximity: f64,
    pub support_test: i32,
    pub support_broken: i32,

    pub pe_low: f64,
    pub pe_high: f64,
    pub pe_low_delta: i32,
    pub pe_high_delta: i32,

    /// Delta applied by every flat-negative reason ("no clear signal").
    pub flat_penalty: i32,

    pub ladder: SignalLadder,
}

impl ScoringConfig {
    pub const BASELINE: &'static str = "baseline";
    pub const REVISED: &'static str = "revised";

    /// First observed revision: symmetric trend deltas, RSI overbought at 70, sell at -2.
    /// It never penalised high P/E, so the high cutoff is unreachable.
    pub fn baseline() -> Self {
        Self {
            revision: Self::BASELINE,
            trend_short_above: 2,
            trend_short_below: -2,
            trend_long_above: 3,
            trend_long_below: -3,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            rsi_oversold_delta: 2,
            rsi_overbought_delta: -2,
            macd_bullish: 1,
            macd_bearish: -1,
            volume_up: 1,
            volume_down: -1,
            pattern_each: 2,
            candle_each: 1,
            support_proximity: 0.02,
            support_test: 2,
            support_broken: -2,
            pe_low: 20.0,
            pe_high: f64::INFINITY,
            pe_low_delta: 1,
            pe_high_delta: -1,
            flat_penalty: 0,
            ladder: SignalLadder {
                strong_buy: 4,
                buy: 2,
                sell: -2,
                strong_sell: -4,
            },
        }
    }

    /// Later revision: breaking a trend line or a volume-confirmed decline costs more than
    /// the matching bullish case earns, RSI overbought at 65, tighter sell cutoffs.
    pub fn revised() -> Self {
        Self {
            revision: Self::REVISED,
            trend_short_above: 2,
            trend_short_below: -3,
            trend_long_above: 3,
            trend_long_below: -4,
            rsi_overbought: 65.0,
            volume_down: -2,
            support_broken: -3,
            pe_high: 35.0,
            ladder: SignalLadder {
                strong_buy: 4,
                buy: 2,
                sell: -1,
                strong_sell: -3,
            },
            ..Self::baseline()
        }
    }

    pub fn named(name: &str) -> anyhow::Result<Self> {
        let config = match name.trim().to_ascii_lowercase().as_str() {
            Self::BASELINE => Self::baseline(),
            Self::REVISED => Self::revised(),
            other => bail!("unknown scoring table {other:?} (expected baseline|revised)"),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let l = &self.ladder;
        ensure!(
            l.strong_sell <= l.sell && l.sell < l.buy && l.buy <= l.strong_buy,
            "signal ladder must satisfy strong_sell <= sell < buy <= strong_buy (got {l:?})"
        );
        ensure!(
            self.rsi_oversold < self.rsi_overbought,
            "rsi_oversold ({}) must be below rsi_overbought ({})",
            self.rsi_oversold,
            self.rsi_overbought
        );
        ensure!(
            self.pe_low <= self.pe_high,
            "pe_low ({}) must not exceed pe_high ({})",
            self.pe_low,
            self.pe_high
        );
        ensure!(
            (0.0..1.0).contains(&self.support_proximity),
            "support_proximity must be in [0, 1) (got {})",
            self.support_proximity
        );
        Ok(())
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::revised()
    }
}
