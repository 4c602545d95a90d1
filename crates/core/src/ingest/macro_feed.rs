use crate::config::Settings;
use anyhow::Context;
use serde::Deserialize;
use std::time::Duration;

const FRED_BASE_URL: &str = "https://api.stlouisfed.org";
const DOLAR_API_BASE_URL: &str = "https://dolarapi.com";
const GDP_SERIES: &str = "GDP";
// Nonfinancial corporate business; corporate equities (millions of dollars).
const MARKET_CAP_SERIES: &str = "NCBEILQ027S";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuffettReading {
    pub buffett_indicator: f64,
    pub gdp: f64,
    pub market_cap: f64,
}

/// Market cap over GDP, in percent. Cap arrives in millions, GDP in billions.
pub fn buffett_reading(
    gdp_billions: f64,
    market_cap_millions: f64,
) -> anyhow::Result<BuffettReading> {
    anyhow::ensure!(gdp_billions > 0.0, "GDP must be positive (got {gdp_billions})");
    let market_cap = market_cap_millions / 1000.0;
    Ok(BuffettReading {
        buffett_indicator: round2(market_cap / gdp_billions * 100.0),
        gdp: round2(gdp_billions),
        market_cap: round2(market_cap),
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[async_trait::async_trait]
pub trait MacroFeed: Send + Sync {
    /// `Ok(None)` when the source is not configured.
    async fn fetch_buffett(&self) -> anyhow::Result<Option<BuffettReading>>;

    async fn fetch_ccl(&self) -> anyhow::Result<f64>;
}

#[derive(Debug, Clone)]
pub struct HttpMacroFeed {
    http: reqwest::Client,
    fred_api_key: Option<String>,
    fred_base_url: String,
    dolar_base_url: String,
}

#[derive(Debug, Deserialize)]
struct FredObservations {
    #[serde(default)]
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct DolarQuote {
    venta: f64,
}

impl HttpMacroFeed {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build macro feed http client")?;

        Ok(Self {
            http,
            fred_api_key: settings.fred_api_key.clone(),
            fred_base_url: settings
                .fred_base_url
                .clone()
                .unwrap_or_else(|| FRED_BASE_URL.to_string()),
            dolar_base_url: settings
                .dolar_api_base_url
                .clone()
                .unwrap_or_else(|| DOLAR_API_BASE_URL.to_string()),
        })
    }

    async fn latest_observation(&self, api_key: &str, series_id: &str) -> anyhow::Result<f64> {
        let url = format!(
            "{}/fred/series/observations",
            self.fred_base_url.trim_end_matches('/')
        );
        let res = self
            .http
            .get(url)
            .query(&[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| e.without_url())
            .with_context(|| format!("FRED request failed (series={series_id})"))?;

        let status = res.status();
        anyhow::ensure!(status.is_success(), "FRED HTTP {status} (series={series_id})");

        let body: FredObservations = res
            .json()
            .await
            .with_context(|| format!("failed to parse FRED response (series={series_id})"))?;
        let obs = body
            .observations
            .first()
            .with_context(|| format!("FRED returned no observations (series={series_id})"))?;

        obs.value.trim().parse::<f64>().with_context(|| {
            format!(
                "FRED observation is not numeric (series={series_id}, date={}, value={:?})",
                obs.date, obs.value
            )
        })
    }
}

#[async_trait::async_trait]
impl MacroFeed for HttpMacroFeed {
    async fn fetch_buffett(&self) -> anyhow::Result<Option<BuffettReading>> {
        let Some(api_key) = self.fred_api_key.as_deref() else {
            return Ok(None);
        };

        let gdp = self.latest_observation(api_key, GDP_SERIES).await?;
        let cap = self.latest_observation(api_key, MARKET_CAP_SERIES).await?;
        buffett_reading(gdp, cap).map(Some)
    }

    async fn fetch_ccl(&self) -> anyhow::Result<f64> {
        let url = format!(
            "{}/v1/dolares/contadoconliqui",
            self.dolar_base_url.trim_end_matches('/')
        );
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("currency quote request failed")?;

        let status = res.status();
        anyhow::ensure!(status.is_success(), "currency quote HTTP {status}");

        let quote: DolarQuote = res
            .json()
            .await
            .context("failed to parse currency quote response")?;
        anyhow::ensure!(
            quote.venta.is_finite() && quote.venta > 0.0,
            "currency quote must be positive (got {})",
            quote.venta
        );
        Ok(quote.venta)
    }
}
