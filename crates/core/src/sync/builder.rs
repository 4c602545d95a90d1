use crate::domain::fixed::round_fixed;
use crate::domain::snapshot::HISTORY_WINDOW;
use crate::domain::{History, Instrument, MetricSnapshot};
use crate::indicators::{self, candles, levels, IndicatorCalculator, IndicatorPeriods};
use crate::ingest::types::DailySeries;

/// Compute one symbol's snapshot from its upstream series.
pub fn build_snapshot(
    instrument: &Instrument,
    mut series: DailySeries,
    calc: &dyn IndicatorCalculator,
    periods: &IndicatorPeriods,
) -> anyhow::Result<MetricSnapshot> {
    series.truncate_to_recent(periods.max_bars);
    let bars = &series.bars;
    anyhow::ensure!(
        bars.len() >= 2,
        "need at least 2 sessions to build a snapshot (symbol={}, got {})",
        instrument.symbol,
        bars.len()
    );

    let closes = series.closes();
    let sma_mid = calc.sma(&closes, periods.sma_mid);
    let ema_short = calc.ema(&closes, periods.ema_short);
    let sma_long = calc.sma(&closes, periods.sma_long);
    let rsi = indicators::latest_rsi(&calc.rsi(&closes, periods.rsi));
    let macd = indicators::latest_macd(&calc.macd(&closes, periods.macd));

    let last = bars[bars.len() - 1];
    let prev = bars[bars.len() - 2];
    let change = last.close - prev.close;
    let change_percent = if prev.close != 0.0 {
        change / prev.close * 100.0
    } else {
        0.0
    };

    let (support, resistance) =
        levels::support_resistance(bars, periods.levels).unwrap_or((last.low, last.high));

    let snapshot = MetricSnapshot {
        symbol: instrument.symbol.clone(),
        name: instrument.name.clone(),
        price: round_fixed(last.close),
        change: round_fixed(change),
        change_percent: round_fixed(change_percent),
        sma50: sma_mid.last().copied().map(round_fixed),
        ema20: ema_short.last().copied().map(round_fixed),
        sma200: sma_long.last().copied().map(round_fixed),
        rsi: round_fixed(rsi),
        // Stored unrounded: quiet symbols cross with sub-cent histograms.
        macd,
        volume: last.volume,
        avg_volume: levels::average_volume(bars, periods.avg_volume).round(),
        support: round_fixed(support.max(0.0)),
        resistance: round_fixed(resistance.max(0.0)),
        pe_ratio: instrument.pe_ratio,
        eps_growth: instrument.eps,
        patterns: Vec::new(),
        candles: candles::detect(bars),
        history: history(&series, &sma_mid, &ema_short, &sma_long),
    };
    snapshot.validate()?;
    Ok(snapshot)
}

// Trailing window; a moving-average series shorter than the window is left empty
// rather than misaligned against the dates.
fn history(
    series: &DailySeries,
    sma_mid: &[f64],
    ema_short: &[f64],
    sma_long: &[f64],
) -> History {
    let n = series.bars.len().min(HISTORY_WINDOW);
    let tail = |v: &[f64]| -> Vec<f64> {
        if v.len() >= n {
            v[v.len() - n..].iter().copied().map(round_fixed).collect()
        } else {
            Vec::new()
        }
    };
    let recent = &series.bars[series.bars.len() - n..];

    History {
        dates: recent.iter().map(|b| b.date).collect(),
        prices: recent.iter().map(|b| round_fixed(b.close)).collect(),
        sma50: tail(sma_mid),
        ema20: tail(ema_short),
        sma200: tail(sma_long),
    }
}
