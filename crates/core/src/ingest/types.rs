use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SERIES_FIELD: &str = "Time Series (Daily)";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A symbol's daily bars, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub symbol: String,
    pub bars: Vec<DailyBar>,
}

impl DailySeries {
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Keep only the most recent `n` bars.
    pub fn truncate_to_recent(&mut self, n: usize) {
        let len = self.bars.len();
        if len > n {
            self.bars.drain(..len - n);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

/// Parse the `Time Series (Daily)` object into an oldest-first series.
pub fn parse_daily_series(symbol: &str, series: &serde_json::Value) -> anyhow::Result<DailySeries> {
    let raw: BTreeMap<NaiveDate, RawBar> = serde_json::from_value(series.clone())
        .with_context(|| format!("unexpected daily series shape for {symbol}"))?;

    let mut bars = Vec::with_capacity(raw.len());
    for (date, bar) in raw {
        bars.push(DailyBar {
            date,
            open: parse_num(&bar.open).with_context(|| format!("bad open on {date}"))?,
            high: parse_num(&bar.high).with_context(|| format!("bad high on {date}"))?,
            low: parse_num(&bar.low).with_context(|| format!("bad low on {date}"))?,
            close: parse_num(&bar.close).with_context(|| format!("bad close on {date}"))?,
            volume: parse_num(&bar.volume).unwrap_or(0.0),
        });
    }

    anyhow::ensure!(bars.len() >= 2, "{symbol}: need at least 2 sessions (got {})", bars.len());

    Ok(DailySeries {
        symbol: symbol.to_string(),
        bars,
    })
}

fn parse_num(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde_json::{json, Value};

    /// Flat bar on 2026-01-01 + `day`, with a one-point range around `close`.
    pub fn bar(day: u32, close: f64, volume: f64) -> DailyBar {
        let base = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        DailyBar {
            date: base + chrono::Duration::days(day as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume,
        }
    }

    pub fn series(symbol: &str, closes: &[f64]) -> DailySeries {
        DailySeries {
            symbol: symbol.to_string(),
            bars: closes
                .iter()
                .enumerate()
                .map(|(i, c)| bar(i as u32, *c, 1_000.0))
                .collect(),
        }
    }

    /// Upstream payload with `n` sessions of a gently rising close.
    pub fn payload(n: u32) -> Value {
        let base = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut ts = serde_json::Map::new();
        for i in 0..n {
            let date = base + chrono::Duration::days(i as i64);
            let close = 100.0 + i as f64 * 0.5;
            ts.insert(
                date.to_string(),
                json!({
                    "1. open": format!("{:.4}", close - 0.2),
                    "2. high": format!("{:.4}", close + 1.0),
                    "3. low": format!("{:.4}", close - 1.0),
                    "4. close": format!("{:.4}", close),
                    "5. volume": format!("{}", 1_000 + i),
                }),
            );
        }
        let mut root = serde_json::Map::new();
        root.insert("Meta Data".to_string(), json!({"2. Symbol": "TEST"}));
        root.insert(SERIES_FIELD.to_string(), Value::Object(ts));
        Value::Object(root)
    }
}
