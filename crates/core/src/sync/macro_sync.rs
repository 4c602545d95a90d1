//! Daily macro record: Buffett indicator plus the CCL quote, and the CCL history point.

use crate::domain::MacroIndicatorSnapshot;
use crate::ingest::macro_feed::MacroFeed;
use crate::storage::cache::{self, KeyValueCache};
use crate::storage::documents::{self, DocumentStore};
use crate::sync::events::SyncObserver;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MacroReport {
    pub buffett: bool,
    pub ccl: bool,
    pub written: bool,
}

pub struct MacroSync {
    feed: Arc<dyn MacroFeed>,
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn KeyValueCache>,
    observer: Arc<dyn SyncObserver>,
}

impl MacroSync {
    pub fn new(
        feed: Arc<dyn MacroFeed>,
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn KeyValueCache>,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        Self {
            feed,
            store,
            cache,
            observer,
        }
    }

    /// Source failures are logged and leave their fields out. Only a failed store write
    /// of the macro record itself is reported in `written`.
    pub async fn run(&self, date: NaiveDate, now: DateTime<Utc>) -> MacroReport {
        let mut report = MacroReport::default();

        let buffett = match self.feed.fetch_buffett().await {
            Ok(Some(reading)) => Some(reading),
            Ok(None) => {
                tracing::info!("FRED_API_KEY not set; skipping Buffett indicator");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, "Buffett indicator fetch failed");
                None
            }
        };
        let ccl = match self.feed.fetch_ccl().await {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::warn!(error = %err, "CCL quote fetch failed");
                None
            }
        };
        report.buffett = buffett.is_some();
        report.ccl = ccl.is_some();

        let snapshot = MacroIndicatorSnapshot {
            buffett_indicator: buffett.map(|b| b.buffett_indicator),
            gdp: buffett.map(|b| b.gdp),
            market_cap: buffett.map(|b| b.market_cap),
            ccl,
            last_updated: now,
        };
        if !snapshot.has_data() {
            self.observer.on_progress("No macro data available; nothing written");
            return report;
        }

        if let Err(err) = documents::merge_macro(self.store.as_ref(), &snapshot).await {
            tracing::warn!(%date, error = %err, "macro record write failed");
            self.observer.on_progress("Failed to save macro data");
            return report;
        }
        report.written = true;

        if let Some(value) = ccl {
            if let Err(err) = documents::merge_ccl_point(self.store.as_ref(), date, value).await {
                tracing::warn!(%date, error = %err, "CCL history write failed");
            }
        }

        self.update_cache(&snapshot);
        tracing::info!(
            %date,
            buffett = ?snapshot.buffett_indicator,
            ccl = ?snapshot.ccl,
            "macro data synced"
        );
        self.observer.on_progress("Macro data synced");
        report
    }

    // Mirror the store's merge: fields absent from this run keep their cached values.
    fn update_cache(&self, fresh: &MacroIndicatorSnapshot) {
        let previous = match cache::load_macro(self.cache.as_ref()) {
            Ok(p) => p,
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unreadable macro cache");
                None
            }
        };
        let merged = match previous {
            Some(prev) => MacroIndicatorSnapshot {
                buffett_indicator: fresh.buffett_indicator.or(prev.buffett_indicator),
                gdp: fresh.gdp.or(prev.gdp),
                market_cap: fresh.market_cap.or(prev.market_cap),
                ccl: fresh.ccl.or(prev.ccl),
                last_updated: fresh.last_updated,
            },
            None => fresh.clone(),
        };
        if let Err(err) = cache::save_macro(self.cache.as_ref(), &merged) {
            tracing::warn!(error = %err, "failed to persist macro cache");
        }
    }
}
