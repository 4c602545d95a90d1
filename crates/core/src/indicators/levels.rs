// Support/resistance from the trailing window of daily lows/highs, and the trailing
// average volume used for volume confirmation.

use crate::ingest::types::DailyBar;

/// `(support, resistance)`: min low and max high over the last `window` bars.
pub fn support_resistance(bars: &[DailyBar], window: usize) -> Option<(f64, f64)> {
    if bars.is_empty() || window == 0 {
        return None;
    }
    let tail = &bars[bars.len().saturating_sub(window)..];
    let support = tail.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let resistance = tail.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    Some((support, resistance))
}

/// Mean volume of the `window` sessions before the latest one; 0 when there are fewer.
pub fn average_volume(bars: &[DailyBar], window: usize) -> f64 {
    if window == 0 || bars.len() < window + 1 {
        return 0.0;
    }
    let prior = &bars[bars.len() - 1 - window..bars.len() - 1];
    prior.iter().map(|b| b.volume).sum::<f64>() / window as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::fixtures::bar;

    #[test]
    fn levels_use_trailing_window_only() {
        let mut bars: Vec<DailyBar> = (0..30).map(|i| bar(i, 100.0, 1_000.0)).collect();
        // Outside the 20-bar window.
        bars[0].low = 1.0;
        bars[1].high = 999.0;
        // Inside it.
        bars[25].low = 90.0;
        bars[28].high = 120.0;

        let (support, resistance) = support_resistance(&bars, 20).unwrap();
        assert_eq!(support, 90.0);
        assert_eq!(resistance, 120.0);
    }

    #[test]
    fn levels_with_short_history_use_everything() {
        let bars: Vec<DailyBar> = (0..3).map(|i| bar(i, 10.0 + i as f64, 1.0)).collect();
        let (support, resistance) = support_resistance(&bars, 20).unwrap();
        assert_eq!(support, bars[0].low);
        assert_eq!(resistance, bars[2].high);
        assert!(support_resistance(&[], 20).is_none());
    }

    #[test]
    fn average_volume_excludes_latest_session() {
        let mut bars: Vec<DailyBar> = (0..21).map(|i| bar(i, 10.0, 100.0)).collect();
        bars[20].volume = 10_000.0;
        assert_eq!(average_volume(&bars, 20), 100.0);
        assert_eq!(average_volume(&bars[..20], 20), 0.0);
    }
}
