pub mod domain;
pub mod indicators;
pub mod ingest;
pub mod scoring;
pub mod storage;
pub mod sync;
pub mod time;

pub mod config {
    use crate::scoring::config::ScoringConfig;
    use anyhow::Context;
    use std::time::Duration;

    pub const DEFAULT_CACHE_DIR: &str = ".cache";
    pub const DEFAULT_SYNC_COOLDOWN_SECS: u64 = 15;
    pub const DEFAULT_FEED_OUTPUT_SIZE: &str = "compact";
    pub const DEFAULT_PORT: u16 = 3000;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub feed_api_key: Option<String>,
        pub fred_api_key: Option<String>,
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub cache_dir: String,
        pub feed_base_url: Option<String>,
        /// `compact` (latest 100 bars) or `full`.
        pub feed_output_size: String,
        /// Per-request timeout for the market feed. Unset means no timeout.
        pub feed_timeout_secs: Option<u64>,
        pub fred_base_url: Option<String>,
        pub dolar_api_base_url: Option<String>,
        pub port: u16,
        pub sync_cooldown_secs: u64,
        /// Comma-separated override of the default universe.
        pub symbols: Option<Vec<String>>,
        pub scoring_table: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Blank values count as unset.
        fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

            let sync_cooldown_secs = match var("SYNC_COOLDOWN_SECS") {
                Some(s) => s.trim().parse::<u64>().with_context(|| {
                    format!("SYNC_COOLDOWN_SECS must be an integer (got {s:?})")
                })?,
                None => DEFAULT_SYNC_COOLDOWN_SECS,
            };

            let feed_output_size = match var("FEED_OUTPUT_SIZE") {
                Some(s) => {
                    let size = s.trim().to_ascii_lowercase();
                    anyhow::ensure!(
                        matches!(size.as_str(), "compact" | "full"),
                        "FEED_OUTPUT_SIZE must be compact or full (got {s:?})"
                    );
                    size
                }
                None => DEFAULT_FEED_OUTPUT_SIZE.to_string(),
            };

            let feed_timeout_secs = match var("FEED_TIMEOUT_SECS") {
                Some(s) => {
                    let secs = s.trim().parse::<u64>().with_context(|| {
                        format!("FEED_TIMEOUT_SECS must be an integer (got {s:?})")
                    })?;
                    anyhow::ensure!(secs > 0, "FEED_TIMEOUT_SECS must be positive");
                    Some(secs)
                }
                None => None,
            };

            let port = match var("PORT") {
                Some(s) => s
                    .trim()
                    .parse::<u16>()
                    .with_context(|| format!("PORT must be a port number (got {s:?})"))?,
                None => DEFAULT_PORT,
            };

            let symbols = var("SYMBOLS").map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_ascii_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            });

            Ok(Self {
                feed_api_key: var("ALPHAVANTAGE_API_KEY"),
                fred_api_key: var("FRED_API_KEY"),
                database_url: var("DATABASE_URL"),
                sentry_dsn: var("SENTRY_DSN"),
                cache_dir: var("CACHE_DIR").unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string()),
                feed_base_url: var("FEED_BASE_URL"),
                feed_output_size,
                feed_timeout_secs,
                fred_base_url: var("FRED_BASE_URL"),
                dolar_api_base_url: var("DOLAR_API_BASE_URL"),
                port,
                sync_cooldown_secs,
                symbols: symbols.filter(|s| !s.is_empty()),
                scoring_table: var("SCORING_TABLE"),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_feed_api_key(&self) -> anyhow::Result<&str> {
            self.feed_api_key
                .as_deref()
                .context("ALPHAVANTAGE_API_KEY is required")
        }

        pub fn sync_cooldown(&self) -> Duration {
            Duration::from_secs(self.sync_cooldown_secs)
        }

        /// The configured threshold table, or the default one.
        pub fn scoring_config(&self) -> anyhow::Result<ScoringConfig> {
            match self.scoring_table.as_deref() {
                Some(name) => ScoringConfig::named(name.trim()),
                None => Ok(ScoringConfig::default()),
            }
        }
    }

}
