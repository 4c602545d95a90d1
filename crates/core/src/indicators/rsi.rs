// Relative Strength Index with Wilder smoothing.
//
// Average gain/loss are seeded with the plain mean of the first `period` deltas, then
// smoothed as avg = (prev * (period - 1) + current) / period.

pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() <= period {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = deltas[..period].iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
    let mut avg_loss = deltas[..period].iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(deltas.len() - period + 1);
    out.push(to_rsi(avg_gain, avg_loss));

    let p = period as f64;
    for &d in &deltas[period..] {
        avg_gain = (avg_gain * (p - 1.0) + d.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-d).max(0.0)) / p;
        out.push(to_rsi(avg_gain, avg_loss));
    }
    out
}

fn to_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_more_points_than_period() {
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(rsi(&closes, 14).is_empty());
        assert_eq!(rsi(&[closes.clone(), vec![15.0]].concat(), 14).len(), 1);
    }

    #[test]
    fn monotonic_rise_saturates() {
        let closes: Vec<f64> = (1..=40).map(|x| x as f64).collect();
        let out = rsi(&closes, 14);
        assert!(out.iter().all(|v| (*v - 100.0).abs() < 1e-9));
    }

    #[test]
    fn monotonic_fall_bottoms_out() {
        let closes: Vec<f64> = (1..=40).rev().map(|x| x as f64).collect();
        let out = rsi(&closes, 14);
        assert!(out.last().copied().unwrap() < 1e-9);
    }

    #[test]
    fn stays_within_bounds_on_choppy_series() {
        let closes: Vec<f64> = (0..100)
            .map(|i| {
                let step = if i % 2 == 0 { 1.5 } else { -1.0 };
                100.0 + step * (i % 7) as f64
            })
            .collect();
        for v in rsi(&closes, 14) {
            assert!((0.0..=100.0).contains(&v));
        }
    }
}
