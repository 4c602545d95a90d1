use crate::domain::fixed::{fixed2, fixed2_opt, not_available};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trailing window kept in [`History`].
pub const HISTORY_WINDOW: usize = 60;

/// One symbol's computed metrics for one trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub symbol: String,
    pub name: String,
    #[serde(with = "fixed2")]
    pub price: f64,
    #[serde(with = "fixed2")]
    pub change: f64,
    #[serde(with = "fixed2")]
    pub change_percent: f64,
    #[serde(default, with = "fixed2_opt")]
    pub sma50: Option<f64>,
    #[serde(default, with = "fixed2_opt")]
    pub ema20: Option<f64>,
    #[serde(default, with = "fixed2_opt")]
    pub sma200: Option<f64>,
    #[serde(with = "fixed2")]
    pub rsi: f64,
    #[serde(default)]
    pub macd: Macd,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub avg_volume: f64,
    #[serde(with = "fixed2")]
    pub support: f64,
    #[serde(with = "fixed2")]
    pub resistance: f64,
    #[serde(default, with = "not_available")]
    pub pe_ratio: Option<f64>,
    #[serde(default, with = "not_available")]
    pub eps_growth: Option<f64>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub candles: Vec<String>,
    #[serde(default)]
    pub history: History,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    #[serde(default)]
    pub line: f64,
    #[serde(default)]
    pub signal: f64,
    #[serde(default)]
    pub histogram: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub dates: Vec<NaiveDate>,
    #[serde(default)]
    pub prices: Vec<f64>,
    #[serde(default)]
    pub sma50: Vec<f64>,
    #[serde(default)]
    pub ema20: Vec<f64>,
    #[serde(default)]
    pub sma200: Vec<f64>,
}

impl History {
    /// Every series is either empty or exactly as long as `dates`.
    pub fn is_aligned(&self) -> bool {
        let n = self.dates.len();
        n <= HISTORY_WINDOW
            && [&self.prices, &self.sma50, &self.ema20, &self.sma200]
                .iter()
                .all(|s| s.is_empty() || s.len() == n)
    }
}

impl MetricSnapshot {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.symbol.trim().is_empty(), "symbol must be non-empty");
        for (field, v) in [
            ("price", self.price),
            ("support", self.support),
            ("resistance", self.resistance),
        ] {
            anyhow::ensure!(
                v.is_finite() && v >= 0.0,
                "{field} must be a non-negative number (symbol={}, got {v})",
                self.symbol
            );
        }
        anyhow::ensure!(
            self.history.is_aligned(),
            "history series are not aligned to dates (symbol={})",
            self.symbol
        );
        Ok(())
    }
}

/// A date's document in the `stocks` collection: symbol -> snapshot.
pub type DayDocument = BTreeMap<String, MetricSnapshot>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroIndicatorSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffett_indicator: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gdp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccl: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

impl MacroIndicatorSnapshot {
    pub fn has_data(&self) -> bool {
        self.buffett_indicator.is_some() || self.ccl.is_some()
    }
}

/// Exchange-rate observations by date. Past dates are never rewritten.
pub type CclHistory = BTreeMap<NaiveDate, f64>;

/// A symbol in the configured universe, with the static fundamentals attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
}

impl Instrument {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            pe_ratio: None,
            eps: None,
        }
    }

    pub fn with_fundamentals(mut self, pe_ratio: Option<f64>, eps: Option<f64>) -> Self {
        self.pe_ratio = pe_ratio;
        self.eps = eps;
        self
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_document_shape() {
        let mut s = fixtures::snapshot("AAPL");
        s.price = 187.456;
        s.ema20 = Some(180.0);
        s.pe_ratio = Some(34.66);
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["price"], json!("187.46"));
        assert_eq!(v["ema20"], json!("180.00"));
        assert_eq!(v["sma200"], json!(null));
        assert_eq!(v["changePercent"], json!("0.00"));
        assert_eq!(v["peRatio"], json!(34.66));
        assert_eq!(v["epsGrowth"], json!("N/A"));
        assert!(v["history"]["dates"].as_array().unwrap().is_empty());
    }

    #[test]
    fn parses_legacy_document_with_string_fields() {
        let v = json!({
            "symbol": "INTC",
            "name": "Intel",
            "price": "20.10",
            "change": "-0.30",
            "changePercent": "-1.47",
            "sma50": "21.00",
            "ema20": "20.50",
            "sma200": "0.00",
            "rsi": "41.20",
            "macd": {"line": -0.2, "signal": -0.1, "histogram": -0.1},
            "volume": 1000,
            "avgVolume": 0,
            "support": "19.80",
            "resistance": "22.00",
            "peRatio": "N/A",
            "epsGrowth": -0.27,
            "patterns": [],
            "candles": [],
            "history": {"dates": ["2026-01-02"], "prices": [20.1], "ema20": [], "sma200": []}
        });
        let s: MetricSnapshot = serde_json::from_value(v).unwrap();
        assert_eq!(s.price, 20.10);
        assert_eq!(s.pe_ratio, None);
        assert_eq!(s.eps_growth, Some(-0.27));
        assert!(s.history.is_aligned());
        s.validate().unwrap();
    }

    #[test]
    fn validate_rejects_negative_support() {
        let mut s = fixtures::snapshot("AAPL");
        s.support = -1.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn misaligned_history_is_detected() {
        let mut s = fixtures::snapshot("AAPL");
        s.history.dates = vec![NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(); 3];
        s.history.prices = vec![1.0, 2.0];
        assert!(!s.history.is_aligned());
        assert!(s.validate().is_err());
    }

    #[test]
    fn macro_snapshot_skips_missing_fields() {
        let m = MacroIndicatorSnapshot {
            buffett_indicator: None,
            gdp: None,
            market_cap: None,
            ccl: Some(1180.5),
            last_updated: chrono::DateTime::parse_from_rfc3339("2026-01-02T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v.as_object().unwrap().len(), 2);
        assert_eq!(v["ccl"], json!(1180.5));
        assert!(m.has_data());
    }
}
