// Candlestick motifs over the last two sessions. Only bullish motifs are reported; each
// one found is a separate entry in the snapshot's `candles` list.

use crate::ingest::types::DailyBar;

pub const HAMMER: &str = "Hammer";
pub const BULLISH_ENGULFING: &str = "Bullish Engulfing";

pub fn detect(bars: &[DailyBar]) -> Vec<String> {
    let mut out = Vec::new();
    let [.., prev, last] = bars else {
        return out;
    };

    if is_hammer(prev, last) {
        out.push(HAMMER.to_string());
    }
    if is_bullish_engulfing(prev, last) {
        out.push(BULLISH_ENGULFING.to_string());
    }
    out
}

// Small body near the top of the range with a long lower shadow, after a down session.
fn is_hammer(prev: &DailyBar, bar: &DailyBar) -> bool {
    let body = (bar.close - bar.open).abs();
    let range = bar.high - bar.low;
    if body <= 0.0 || range <= 0.0 {
        return false;
    }
    let lower_shadow = bar.open.min(bar.close) - bar.low;
    let upper_shadow = bar.high - bar.open.max(bar.close);
    prev.close < prev.open && lower_shadow >= 2.0 * body && upper_shadow <= 0.5 * body
}

fn is_bullish_engulfing(prev: &DailyBar, bar: &DailyBar) -> bool {
    prev.close < prev.open
        && bar.close > bar.open
        && bar.open <= prev.close
        && bar.close >= prev.open
}
