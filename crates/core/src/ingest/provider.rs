use crate::config::Settings;
use crate::ingest::types::{parse_daily_series, DailySeries, SERIES_FIELD};
use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
const DEFAULT_PATH: &str = "/query";

/// How an upstream request failed. The sync pipeline decides what to do per variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error("invalid or missing API key: {0}")]
    InvalidCredential(String),
    #[error("upstream quota exhausted: {0}")]
    QuotaExhausted(String),
    #[error("transient fetch error: {0}")]
    Transient(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FeedError {
    /// Errors that skip the current symbol only. Quota and credential failures end the backfill.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Malformed(_))
    }
}

#[async_trait::async_trait]
pub trait MarketFeed: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// One upstream request for one symbol's daily series.
    async fn fetch_daily_series(&self, symbol: &str) -> Result<DailySeries, FeedError>;
}

#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    output_size: String,
}

impl AlphaVantageClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_feed_api_key()?.to_string();

        let base_url = settings
            .feed_base_url
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        // No timeout unless configured: a hung request stalls the run instead of failing it.
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = settings.feed_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .context("failed to build market feed http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            output_size: settings.feed_output_size.clone(),
        })
    }

    fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), DEFAULT_PATH)
    }
}

#[async_trait::async_trait]
impl MarketFeed for AlphaVantageClient {
    fn provider_name(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch_daily_series(&self, symbol: &str) -> Result<DailySeries, FeedError> {
        let res = self
            .http
            .get(self.url())
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", self.output_size.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            // The URL carries the API key; keep it out of error messages.
            .map_err(|e| FeedError::Transient(e.without_url().to_string()))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| FeedError::Transient(e.without_url().to_string()))?;

        if let Some(err) = classify_status(status, &text) {
            return Err(err);
        }

        let body = serde_json::from_str::<Value>(&text)
            .map_err(|e| FeedError::Malformed(format!("response is not valid JSON: {e}")))?;

        classify_payload(symbol, &body)
    }
}

pub fn classify_status(status: StatusCode, text: &str) -> Option<FeedError> {
    if status.is_success() {
        return None;
    }
    let detail = format!("HTTP {status}: {}", truncate(text, 200));
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FeedError::InvalidCredential(detail),
        StatusCode::TOO_MANY_REQUESTS => FeedError::QuotaExhausted(detail),
        _ => FeedError::Transient(detail),
    })
}

/// Classify a 200 payload by which field it carries: an error, a rate-limit notice, or the
/// expected series.
pub fn classify_payload(symbol: &str, body: &Value) -> Result<DailySeries, FeedError> {
    if let Some(msg) = body.get("Error Message").and_then(Value::as_str) {
        if mentions_api_key(msg) {
            return Err(FeedError::InvalidCredential(msg.to_string()));
        }
        return Err(FeedError::Transient(format!("{symbol}: {msg}")));
    }

    for field in ["Information", "Note"] {
        if let Some(msg) = body.get(field).and_then(Value::as_str) {
            let lower = msg.to_ascii_lowercase();
            if lower.contains("rate limit")
                || lower.contains("call frequency")
                || lower.contains("requests per day")
            {
                return Err(FeedError::QuotaExhausted(msg.to_string()));
            }
            if mentions_api_key(msg) {
                return Err(FeedError::InvalidCredential(msg.to_string()));
            }
            return Err(FeedError::Malformed(format!("{symbol}: {msg}")));
        }
    }

    let Some(series) = body.get(SERIES_FIELD) else {
        return Err(FeedError::Malformed(format!(
            "{symbol}: response has no {SERIES_FIELD:?} field"
        )));
    };

    parse_daily_series(symbol, series).map_err(|e| FeedError::Malformed(format!("{e:#}")))
}

fn mentions_api_key(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    lower.contains("apikey") || lower.contains("api key")
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::fixtures::payload;
    use serde_json::json;

    #[test]
    fn classifies_series_as_success() {
        let s = classify_payload("AAPL", &payload(30)).unwrap();
        assert_eq!(s.symbol, "AAPL");
        assert_eq!(s.bars.len(), 30);
        assert!(s.bars.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn classifies_daily_rate_limit_notice_as_quota() {
        let body = json!({
            "Information": "We have detected your API key as XYZ and our standard API rate limit is 25 requests per day."
        });
        assert!(matches!(
            classify_payload("AAPL", &body),
            Err(FeedError::QuotaExhausted(_))
        ));
    }

    #[test]
    fn classifies_frequency_note_as_quota() {
        let body = json!({
            "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."
        });
        assert!(matches!(
            classify_payload("AAPL", &body),
            Err(FeedError::QuotaExhausted(_))
        ));
    }

    #[test]
    fn classifies_bad_key_as_invalid_credential() {
        let body = json!({
            "Error Message": "the parameter apikey is invalid or missing. Please claim your free API key."
        });
        let err = classify_payload("AAPL", &body).unwrap_err();
        assert!(matches!(err, FeedError::InvalidCredential(_)));
        assert!(!err.is_skippable());
    }

    #[test]
    fn classifies_unknown_symbol_as_skippable() {
        let body = json!({"Error Message": "Invalid API call. Please retry or visit the documentation."});
        let err = classify_payload("ZZZZ", &body).unwrap_err();
        assert!(err.is_skippable());
    }

    #[test]
    fn missing_series_is_malformed() {
        let err = classify_payload("AAPL", &json!({"Meta Data": {}})).unwrap_err();
        assert!(matches!(err, FeedError::Malformed(_)));
        assert!(err.is_skippable());
    }

    #[test]
    fn classifies_http_status() {
        assert!(classify_status(StatusCode::OK, "").is_none());
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "nope"),
            Some(FeedError::InvalidCredential(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            Some(FeedError::QuotaExhausted(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "<html>"),
            Some(FeedError::Transient(_))
        ));
    }
}
