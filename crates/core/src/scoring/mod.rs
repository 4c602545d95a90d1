//! Signal Scoring Engine: a pure projection from a metrics snapshot to a signal, an
//! integer score and the reasons behind it.

pub mod config;

use crate::domain::MetricSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use config::{ScoringConfig, SignalLadder};

// Display weights. They order the reasons and never touch the score.
const W_TREND: i32 = 10;
const W_PATTERN: i32 = 9;
const W_SUPPORT: i32 = 9;
const W_RSI: i32 = 8;
const W_CANDLE: i32 = 7;
const W_MACD: i32 = 6;
const W_VOLUME: i32 = 5;
const W_PE: i32 = 4;
const W_LOW_VOLUME: i32 = 3;
const W_RSI_NEUTRAL: i32 = 2;
const W_SUPPORT_FAR: i32 = 2;
const W_PE_AVERAGE: i32 = 2;
const W_NO_DETECTION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    #[default]
    Short,
    Long,
}

impl FromStr for Horizon {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "long" => Ok(Self::Long),
            other => anyhow::bail!("unknown horizon {other:?} (expected short|long)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Signal {
    /// Position on the buy/sell ladder; higher is more bullish.
    pub fn level(self) -> i8 {
        match self {
            Self::StrongSell => -2,
            Self::Sell => -1,
            Self::Hold => 0,
            Self::Buy => 1,
            Self::StrongBuy => 2,
        }
    }

    pub fn is_buy(self) -> bool {
        self.level() > 0
    }

    pub fn is_sell(self) -> bool {
        self.level() < 0
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StrongBuy => "strong buy",
            Self::Buy => "buy",
            Self::Hold => "hold",
            Self::Sell => "sell",
            Self::StrongSell => "strong sell",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredReason {
    pub text: String,
    pub polarity: Polarity,
    pub weight: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub signal: Signal,
    pub score: i32,
    pub reasons: Vec<ScoredReason>,
}

pub fn classify(score: i32, ladder: &SignalLadder) -> Signal {
    if score >= ladder.strong_buy {
        Signal::StrongBuy
    } else if score >= ladder.buy {
        Signal::Buy
    } else if score <= ladder.strong_sell {
        Signal::StrongSell
    } else if score <= ladder.sell {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

struct Tally<'a> {
    config: &'a ScoringConfig,
    score: i32,
    reasons: Vec<ScoredReason>,
}

impl Tally<'_> {
    fn add(&mut self, delta: i32, polarity: Polarity, weight: i32, text: String) {
        self.score += delta;
        self.reasons.push(ScoredReason {
            text,
            polarity,
            weight,
        });
    }

    fn positive(&mut self, delta: i32, weight: i32, text: impl Into<String>) {
        self.add(delta, Polarity::Positive, weight, text.into());
    }

    fn negative(&mut self, delta: i32, weight: i32, text: impl Into<String>) {
        self.add(delta, Polarity::Negative, weight, text.into());
    }

    fn flat(&mut self, weight: i32, text: impl Into<String>) {
        let penalty = self.config.flat_penalty;
        self.negative(penalty, weight, text);
    }
}

pub fn score(snapshot: &MetricSnapshot, horizon: Horizon, config: &ScoringConfig) -> Analysis {
    let mut t = Tally {
        config,
        score: 0,
        reasons: Vec::with_capacity(8),
    };

    trend(&mut t, snapshot, horizon);
    oscillator(&mut t, snapshot);
    momentum(&mut t, snapshot);
    volume(&mut t, snapshot);
    detections(&mut t, snapshot);
    support(&mut t, snapshot);
    valuation(&mut t, snapshot);

    // Stable: equal weights keep evaluation order.
    t.reasons.sort_by(|a, b| b.weight.cmp(&a.weight));

    Analysis {
        signal: classify(t.score, &config.ladder),
        score: t.score,
        reasons: t.reasons,
    }
}

/// Score every snapshot and order best-first. Ties keep input order.
pub fn rank<'a>(
    snapshots: &'a [MetricSnapshot],
    horizon: Horizon,
    config: &ScoringConfig,
) -> Vec<(&'a MetricSnapshot, Analysis)> {
    let mut out: Vec<_> = snapshots
        .iter()
        .map(|s| (s, score(s, horizon, config)))
        .collect();
    out.sort_by(|a, b| b.1.score.cmp(&a.1.score));
    out
}

fn trend(t: &mut Tally<'_>, s: &MetricSnapshot, horizon: Horizon) {
    let c = t.config;
    match horizon {
        Horizon::Short => {
            let (ma, label) = match (s.ema20, s.sma50) {
                (Some(ema), _) => (ema, "EMA 20"),
                (None, Some(sma)) => (sma, "SMA 50"),
                (None, None) => {
                    t.negative(
                        0,
                        W_TREND,
                        "Short-term averages unavailable (insufficient history)",
                    );
                    return;
                }
            };
            if s.price > ma {
                t.positive(
                    c.trend_short_above,
                    W_TREND,
                    format!("Price above {label} (short-term uptrend)"),
                );
            } else {
                t.negative(
                    c.trend_short_below,
                    W_TREND,
                    format!("Price below {label} (short-term downtrend)"),
                );
            }
        }
        Horizon::Long => match s.sma200 {
            Some(sma) if s.price > sma => {
                t.positive(
                    c.trend_long_above,
                    W_TREND,
                    "Price above SMA 200 (long-term uptrend)",
                );
            }
            Some(_) => {
                t.negative(
                    c.trend_long_below,
                    W_TREND,
                    "Price below SMA 200 (long-term downtrend)",
                );
            }
            None => {
                t.negative(0, W_TREND, "SMA 200 unavailable (insufficient history)");
            }
        },
    }
}

fn oscillator(t: &mut Tally<'_>, s: &MetricSnapshot) {
    let c = t.config;
    if s.rsi < c.rsi_oversold {
        t.positive(
            c.rsi_oversold_delta,
            W_RSI,
            format!("RSI at {:.2} (oversold, rebound likely)", s.rsi),
        );
    } else if s.rsi > c.rsi_overbought {
        t.negative(
            c.rsi_overbought_delta,
            W_RSI,
            format!("RSI at {:.2} (overbought, pullback likely)", s.rsi),
        );
    } else {
        t.flat(
            W_RSI_NEUTRAL,
            format!("RSI at {:.2} (neutral zone, no clear signal)", s.rsi),
        );
    }
}

fn momentum(t: &mut Tally<'_>, s: &MetricSnapshot) {
    let c = t.config;
    if s.macd.histogram > 0.0 && s.macd.line > s.macd.signal {
        t.positive(c.macd_bullish, W_MACD, "MACD bullish crossover");
    } else {
        t.negative(
            c.macd_bearish,
            W_MACD,
            "MACD: no bullish crossover or bearish momentum",
        );
    }
}

fn volume(t: &mut Tally<'_>, s: &MetricSnapshot) {
    let c = t.config;
    if s.avg_volume > 0.0 && s.volume > s.avg_volume {
        if s.change > 0.0 {
            t.positive(c.volume_up, W_VOLUME, "High volume confirming the rise");
        } else {
            t.negative(c.volume_down, W_VOLUME, "High volume confirming the decline");
        }
    } else {
        t.flat(W_LOW_VOLUME, "Average or low volume (weak confirmation)");
    }
}

fn detections(t: &mut Tally<'_>, s: &MetricSnapshot) {
    let c = t.config;
    if s.patterns.is_empty() {
        t.flat(W_NO_DETECTION, "No clear chart patterns");
    }
    for p in &s.patterns {
        t.positive(c.pattern_each, W_PATTERN, format!("Pattern detected: {p}"));
    }

    if s.candles.is_empty() {
        t.flat(W_NO_DETECTION, "No relevant candlestick patterns");
    }
    for k in &s.candles {
        t.positive(c.candle_each, W_CANDLE, format!("Candlestick: {k}"));
    }
}

fn support(t: &mut Tally<'_>, s: &MetricSnapshot) {
    let c = t.config;
    let near = s.price > 0.0 && (s.price - s.support).abs() / s.price < c.support_proximity;
    if near {
        t.positive(
            c.support_test,
            W_SUPPORT,
            format!("Price testing support at {:.2}", s.support),
        );
    } else if s.price < s.support {
        t.negative(
            c.support_broken,
            W_SUPPORT,
            format!("Support at {:.2} broken", s.support),
        );
    } else {
        t.flat(W_SUPPORT_FAR, "Far from a major support zone");
    }
}

fn valuation(t: &mut Tally<'_>, s: &MetricSnapshot) {
    let c = t.config;
    let Some(pe) = s.pe_ratio else {
        return;
    };
    if pe < c.pe_low {
        t.positive(c.pe_low_delta, W_PE, format!("Fundamental: low P/E ({pe:.2})"));
    } else if pe > c.pe_high {
        t.negative(
            c.pe_high_delta,
            W_PE,
            format!("Fundamental: high P/E ({pe:.2}, overvalued)"),
        );
    } else {
        t.flat(W_PE_AVERAGE, "Fundamental: average P/E");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::fixtures::snapshot;
    use crate::domain::Macd;

    fn bullish_example() -> MetricSnapshot {
        let mut s = snapshot("AAPL");
        s.price = 105.0;
        s.ema20 = Some(100.0);
        s.rsi = 25.0;
        s.macd = Macd {
            line: 1.0,
            signal: 0.0,
            histogram: 1.0,
        };
        s.volume = 200.0;
        s.avg_volume = 100.0;
        s.change = 2.0;
        s.patterns = vec!["Double Bottom".to_string()];
        s.support = 104.0;
        s.resistance = 110.0;
        s.pe_ratio = Some(15.0);
        s
    }

    fn bearish_example() -> MetricSnapshot {
        let mut s = snapshot("TSLA");
        s.price = 90.0;
        s.sma200 = Some(100.0);
        s.rsi = 75.0;
        s
    }

    fn texts(a: &Analysis) -> Vec<&str> {
        a.reasons.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn bullish_short_example_resolves_to_buy_tier() {
        for config in [ScoringConfig::baseline(), ScoringConfig::revised()] {
            let a = score(&bullish_example(), Horizon::Short, &config);
            assert!(a.score > 0);
            assert!(a.signal.is_buy(), "{:?} under {}", a.signal, config.revision);

            let t = texts(&a);
            assert!(t.contains(&"Price above EMA 20 (short-term uptrend)"));
            assert!(t.contains(&"RSI at 25.00 (oversold, rebound likely)"));
            assert!(t.contains(&"MACD bullish crossover"));
            assert!(t.contains(&"High volume confirming the rise"));
            assert!(t.contains(&"Pattern detected: Double Bottom"));
            assert!(t.contains(&"Price testing support at 104.00"));
            assert!(t.contains(&"Fundamental: low P/E (15.00)"));
            assert!(t.contains(&"No relevant candlestick patterns"));
        }
    }

    #[test]
    fn bullish_short_example_exact_score() {
        // trend 2 + rsi 2 + macd 1 + volume 1 + pattern 2 + support 2 + pe 1
        let a = score(&bullish_example(), Horizon::Short, &ScoringConfig::revised());
        assert_eq!(a.score, 11);
        assert_eq!(a.signal, Signal::StrongBuy);
    }

    #[test]
    fn bearish_long_example_resolves_to_sell_tier() {
        for config in [ScoringConfig::baseline(), ScoringConfig::revised()] {
            let a = score(&bearish_example(), Horizon::Long, &config);
            assert!(a.signal.is_sell(), "{:?} under {}", a.signal, config.revision);

            let negatives: Vec<&str> = a
                .reasons
                .iter()
                .filter(|r| r.polarity == Polarity::Negative)
                .map(|r| r.text.as_str())
                .collect();
            assert!(negatives.contains(&"Price below SMA 200 (long-term downtrend)"));
            assert!(negatives.contains(&"RSI at 75.00 (overbought, pullback likely)"));
            assert!(negatives.contains(&"No clear chart patterns"));
            assert!(negatives.contains(&"No relevant candlestick patterns"));
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let config = ScoringConfig::default();
        for s in [bullish_example(), bearish_example(), snapshot("KO")] {
            for h in [Horizon::Short, Horizon::Long] {
                assert_eq!(score(&s, h, &config), score(&s, h, &config));
            }
        }
    }

    #[test]
    fn reasons_sorted_by_weight_and_stable_on_ties() {
        let mut s = bearish_example();
        s.candles = vec!["Hammer".into(), "Bullish Engulfing".into()];
        let a = score(&s, Horizon::Short, &ScoringConfig::default());

        assert!(a.reasons.windows(2).all(|w| w[0].weight >= w[1].weight));

        // Same weight, evaluation order preserved.
        let hammer = a.reasons.iter().position(|r| r.text == "Candlestick: Hammer");
        let engulf = a
            .reasons
            .iter()
            .position(|r| r.text == "Candlestick: Bullish Engulfing");
        assert!(hammer.unwrap() < engulf.unwrap());

        let pats = a.reasons.iter().position(|r| r.text == "No clear chart patterns");
        assert_eq!(a.reasons.last().map(|r| r.weight), Some(W_NO_DETECTION));
        assert!(pats.is_some());
        assert_eq!(a.reasons[0].weight, W_TREND);
    }

    #[test]
    fn classification_is_monotonic_in_score() {
        for config in [ScoringConfig::baseline(), ScoringConfig::revised()] {
            let mut prev = classify(-50, &config.ladder).level();
            for score in -49..=50 {
                let level = classify(score, &config.ladder).level();
                assert!(level >= prev, "score {score} moved the signal down");
                prev = level;
            }
        }
    }

    #[test]
    fn ladder_boundaries() {
        let l = ScoringConfig::baseline().ladder;
        assert_eq!(classify(4, &l), Signal::StrongBuy);
        assert_eq!(classify(2, &l), Signal::Buy);
        assert_eq!(classify(1, &l), Signal::Hold);
        assert_eq!(classify(-1, &l), Signal::Hold);
        assert_eq!(classify(-2, &l), Signal::Sell);
        assert_eq!(classify(-4, &l), Signal::StrongSell);

        let l = ScoringConfig::revised().ladder;
        assert_eq!(classify(-1, &l), Signal::Sell);
        assert_eq!(classify(-3, &l), Signal::StrongSell);
    }

    #[test]
    fn short_trend_falls_back_to_sma50_label() {
        let mut s = snapshot("KO");
        s.price = 60.0;
        s.sma50 = Some(55.0);
        let a = score(&s, Horizon::Short, &ScoringConfig::default());
        assert_eq!(a.reasons[0].text, "Price above SMA 50 (short-term uptrend)");
    }

    #[test]
    fn trend_penalty_is_asymmetric_in_revised_table() {
        let config = ScoringConfig::revised();
        let mut up = snapshot("KO");
        up.ema20 = Some(90.0);
        let mut down = snapshot("KO");
        down.ema20 = Some(110.0);
        let a_up = score(&up, Horizon::Short, &config).score;
        let a_down = score(&down, Horizon::Short, &config).score;
        // Both share every other rule outcome.
        assert_eq!(a_up - a_down, config.trend_short_above - config.trend_short_below);
        assert!(config.trend_short_below.abs() > config.trend_short_above);
    }

    #[test]
    fn rsi_neutral_band_is_a_negative_reason() {
        let a = score(&snapshot("KO"), Horizon::Short, &ScoringConfig::default());
        let r = a
            .reasons
            .iter()
            .find(|r| r.text.starts_with("RSI at 50.00"))
            .unwrap();
        assert_eq!(r.polarity, Polarity::Negative);
        assert_eq!(r.weight, W_RSI_NEUTRAL);
    }

    #[test]
    fn rsi_overbought_boundary_differs_between_revisions() {
        let mut s = snapshot("KO");
        s.rsi = 67.0;
        let base = score(&s, Horizon::Short, &ScoringConfig::baseline());
        let rev = score(&s, Horizon::Short, &ScoringConfig::revised());
        assert!(base.reasons.iter().any(|r| r.text.contains("neutral zone")));
        assert!(rev.reasons.iter().any(|r| r.text.contains("overbought")));
    }

    #[test]
    fn volume_confirmed_decline_costs_more_than_rise_earns() {
        let config = ScoringConfig::revised();
        let mut up = snapshot("KO");
        up.volume = 300.0;
        up.avg_volume = 100.0;
        up.change = 1.5;
        let mut down = up.clone();
        down.change = -1.5;
        let flat_volume = {
            let mut s = up.clone();
            s.volume = 50.0;
            score(&s, Horizon::Short, &config).score
        };
        let gain = score(&up, Horizon::Short, &config).score - flat_volume;
        let loss = flat_volume - score(&down, Horizon::Short, &config).score;
        assert!(loss > gain);
    }

    #[test]
    fn zero_average_volume_is_low_confirmation() {
        let mut s = snapshot("KO");
        s.volume = 1_000_000.0;
        s.avg_volume = 0.0;
        let a = score(&s, Horizon::Short, &ScoringConfig::default());
        assert!(a
            .reasons
            .iter()
            .any(|r| r.text == "Average or low volume (weak confirmation)"));
    }

    #[test]
    fn each_detection_adds_one_reason_and_one_unit() {
        let config = ScoringConfig::default();
        let base = score(&snapshot("KO"), Horizon::Short, &config);

        let mut s = snapshot("KO");
        s.patterns = vec!["Double Bottom".into(), "Cup and Handle".into()];
        s.candles = vec!["Hammer".into()];
        let a = score(&s, Horizon::Short, &config);

        assert_eq!(
            a.score - base.score,
            2 * config.pattern_each + config.candle_each - 2 * config.flat_penalty
        );
        // Two flat "none" reasons replaced by three detections.
        assert_eq!(a.reasons.len(), base.reasons.len() + 1);
    }

    #[test]
    fn support_broken_vs_far() {
        let config = ScoringConfig::revised();
        let mut broken = snapshot("KO");
        broken.price = 90.0;
        broken.support = 100.0;
        let a = score(&broken, Horizon::Short, &config);
        let r = a.reasons.iter().find(|r| r.text == "Support at 100.00 broken").unwrap();
        assert_eq!(r.polarity, Polarity::Negative);

        let mut far = snapshot("KO");
        far.price = 130.0;
        far.support = 100.0;
        let b = score(&far, Horizon::Short, &config);
        assert!(b.reasons.iter().any(|r| r.text == "Far from a major support zone"));
        assert!(a.score < b.score);
    }

    #[test]
    fn missing_pe_skips_valuation_group() {
        let a = score(&snapshot("INTC"), Horizon::Short, &ScoringConfig::default());
        assert!(!a.reasons.iter().any(|r| r.text.starts_with("Fundamental")));

        let mut s = snapshot("TSLA");
        s.pe_ratio = Some(386.41);
        let a = score(&s, Horizon::Short, &ScoringConfig::revised());
        assert!(a
            .reasons
            .iter()
            .any(|r| r.text == "Fundamental: high P/E (386.41, overvalued)"));
        let b = score(&s, Horizon::Short, &ScoringConfig::baseline());
        assert!(b.reasons.iter().any(|r| r.text == "Fundamental: average P/E"));
    }

    #[test]
    fn long_horizon_without_sma200_is_flagged() {
        let a = score(&snapshot("KO"), Horizon::Long, &ScoringConfig::default());
        assert_eq!(a.reasons[0].text, "SMA 200 unavailable (insufficient history)");
    }

    #[test]
    fn zeroed_sma200_in_older_documents_is_unavailable() {
        let mut doc = serde_json::to_value(snapshot("KO")).unwrap();
        doc["sma200"] = serde_json::json!("0.00");
        let s: MetricSnapshot = serde_json::from_value(doc).unwrap();

        let a = score(&s, Horizon::Long, &ScoringConfig::default());
        assert_eq!(a.reasons[0].text, "SMA 200 unavailable (insufficient history)");
        assert!(!a.reasons.iter().any(|r| r.text.contains("long-term uptrend")));
    }

    #[test]
    fn rank_orders_best_first() {
        let list = vec![bearish_example(), bullish_example(), snapshot("KO")];
        let ranked = rank(&list, Horizon::Short, &ScoringConfig::default());
        assert_eq!(ranked[0].0.symbol, "AAPL");
        assert!(ranked.windows(2).all(|w| w[0].1.score >= w[1].1.score));
    }

    #[test]
    fn horizon_parses() {
        assert_eq!("LONG".parse::<Horizon>().unwrap(), Horizon::Long);
        assert!("medium".parse::<Horizon>().is_err());
    }
}
