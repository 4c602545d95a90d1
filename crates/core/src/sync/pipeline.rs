//! Per-date snapshot sync: cached list first, then the remote day document, then a
//! throttled sequential backfill of whatever the universe still lacks.

use crate::domain::{DayDocument, Instrument, MetricSnapshot};
use crate::indicators::{IndicatorCalculator, IndicatorPeriods, StandardIndicators};
use crate::ingest::provider::{FeedError, MarketFeed};
use crate::storage::cache::{self, KeyValueCache};
use crate::storage::documents::{self, DocumentStore};
use crate::sync::builder::build_snapshot;
use crate::sync::events::SyncObserver;
use crate::sync::usage::UsageCounter;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Pause before every upstream request except the first of a run.
    pub cooldown: Duration,
    pub periods: IndicatorPeriods,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            periods: IndicatorPeriods::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Complete,
    Partial,
    QuotaExhausted,
    Disabled,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::QuotaExhausted => "quota_exhausted",
            Self::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    pub date: NaiveDate,
    pub status: SyncStatus,
    pub fetched: usize,
    pub skipped: usize,
    pub failed_writes: usize,
    /// Upstream requests made by this run.
    pub requests: u32,
    pub remote_available: bool,
    /// Universe symbols still missing after the run, in universe order.
    pub pending: Vec<String>,
}

pub struct SyncPipeline {
    feed: Arc<dyn MarketFeed>,
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn KeyValueCache>,
    calculator: Arc<dyn IndicatorCalculator>,
    observer: Arc<dyn SyncObserver>,
    options: SyncOptions,
    limit_reached: bool,
    disabled: bool,
    usage: Option<UsageCounter>,
}

impl SyncPipeline {
    pub fn new(
        feed: Arc<dyn MarketFeed>,
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn KeyValueCache>,
        observer: Arc<dyn SyncObserver>,
        options: SyncOptions,
    ) -> Self {
        Self {
            feed,
            store,
            cache,
            calculator: Arc::new(StandardIndicators),
            observer,
            options,
            limit_reached: false,
            disabled: false,
            usage: None,
        }
    }

    /// Set once the upstream reports an exhausted quota; never cleared on this instance.
    pub fn limit_reached(&self) -> bool {
        self.limit_reached
    }

    /// Set after a credential failure.
    pub fn disabled(&self) -> bool {
        self.disabled
    }

    pub fn usage(&self) -> Option<UsageCounter> {
        self.usage
    }

    pub async fn run(
        &mut self,
        date: NaiveDate,
        universe: &[Instrument],
    ) -> anyhow::Result<SyncReport> {
        let cached = match cache::load_stocks(self.cache.as_ref(), date) {
            Ok(list) => list,
            Err(err) => {
                tracing::warn!(%date, error = %err, "ignoring unreadable stocks cache");
                Vec::new()
            }
        };
        if !cached.is_empty() {
            self.observer.on_snapshot_list_updated(&cached);
            self.progress(&format!("Loaded {} cached snapshots for {date}", cached.len()));
        }

        self.progress(&format!("Syncing {date} with the remote store"));
        let remote_read = documents::read_day(self.store.as_ref(), date).await;
        let (remote, remote_available) = match remote_read {
            Ok(doc) => (doc.unwrap_or_default(), true),
            Err(err) => {
                tracing::warn!(
                    %date,
                    backend = self.store.backend_name(),
                    error = %err,
                    "remote read failed"
                );
                self.progress("Remote store unavailable; continuing with cached data");
                (DayDocument::new(), false)
            }
        };

        let (mut merged, changed) = merge_remote(cached, remote);
        if changed {
            self.save_cache(date, &merged, &HashSet::new());
            self.observer.on_snapshot_list_updated(&merged);
            self.progress(&format!("Updated with remote data: {} snapshots", merged.len()));
        } else if remote_available {
            self.progress("Remote data unchanged");
        }

        let pending: Vec<Instrument> = pending_symbols(universe, &merged)
            .into_iter()
            .cloned()
            .collect();

        let mut report = SyncReport {
            date,
            status: SyncStatus::Complete,
            fetched: 0,
            skipped: 0,
            failed_writes: 0,
            requests: 0,
            remote_available,
            pending: Vec::new(),
        };

        if pending.is_empty() {
            self.progress(&format!("All {} symbols up to date for {date}", merged.len()));
            return Ok(report);
        }

        if self.disabled {
            self.progress("Sync disabled after a credential failure; no requests made");
        } else if self.limit_reached {
            self.progress("API limit already reached; no requests made");
        } else {
            self.backfill(date, &pending, &mut merged, &mut report).await;
        }

        report.pending = pending_symbols(universe, &merged)
            .into_iter()
            .map(|i| i.symbol.clone())
            .collect();
        report.status = if self.disabled {
            SyncStatus::Disabled
        } else if self.limit_reached {
            SyncStatus::QuotaExhausted
        } else if report.pending.is_empty() && report.failed_writes == 0 {
            SyncStatus::Complete
        } else {
            SyncStatus::Partial
        };

        tracing::info!(
            %date,
            status = report.status.as_str(),
            fetched = report.fetched,
            skipped = report.skipped,
            failed_writes = report.failed_writes,
            requests = report.requests,
            pending = report.pending.len(),
            "sync run finished"
        );
        Ok(report)
    }

    async fn backfill(
        &mut self,
        date: NaiveDate,
        pending: &[Instrument],
        merged: &mut Vec<MetricSnapshot>,
        report: &mut SyncReport,
    ) {
        let total = pending.len();
        let mut usage = UsageCounter::load(self.cache.as_ref(), date);
        // Symbols whose store write failed stay out of the cache so the next run refetches them.
        let mut unsaved: HashSet<String> = HashSet::new();

        tracing::info!(
            %date,
            provider = self.feed.provider_name(),
            total,
            used_today = usage.count(),
            "starting backfill"
        );
        self.progress(&format!("Fetching {total} missing symbols for {date}"));

        for (idx, instrument) in pending.iter().enumerate() {
            if idx != 0 {
                tokio::time::sleep(self.options.cooldown).await;
            }
            let n = idx + 1;
            let symbol = instrument.symbol.as_str();

            usage.increment(self.cache.as_ref());
            report.requests += 1;

            let series = match self.feed.fetch_daily_series(symbol).await {
                Ok(series) => series,
                Err(FeedError::QuotaExhausted(msg)) => {
                    self.limit_reached = true;
                    tracing::warn!(%date, symbol, error = %msg, "upstream quota exhausted");
                    self.progress("API limit reached. Stopping backfill.");
                    break;
                }
                Err(err) if err.is_skippable() => {
                    report.skipped += 1;
                    tracing::warn!(idx, symbol, error = %err, "fetch failed; skipping symbol");
                    self.progress(&format!("[{n}/{total}] Skipped {symbol}: {err}"));
                    continue;
                }
                // Only a rejected credential is left.
                Err(err) => {
                    self.disabled = true;
                    tracing::error!(%date, symbol, error = %err, "upstream rejected credentials");
                    self.progress("API key rejected. Sync disabled.");
                    break;
                }
            };

            let snapshot = match build_snapshot(
                instrument,
                series,
                self.calculator.as_ref(),
                &self.options.periods,
            ) {
                Ok(s) => s,
                Err(err) => {
                    report.skipped += 1;
                    tracing::warn!(
                        idx,
                        symbol,
                        error = %err,
                        "snapshot build failed; skipping symbol"
                    );
                    self.progress(&format!("[{n}/{total}] Skipped {symbol}: {err}"));
                    continue;
                }
            };

            let write = documents::merge_snapshot(self.store.as_ref(), date, &snapshot).await;
            let saved = write.is_ok();
            if let Err(err) = write {
                report.failed_writes += 1;
                unsaved.insert(snapshot.symbol.clone());
                tracing::warn!(
                    %date,
                    symbol,
                    error = %err,
                    "store write failed; kept in memory only"
                );
            }

            merged.push(snapshot);
            report.fetched += 1;
            self.save_cache(date, merged, &unsaved);
            self.observer.on_snapshot_list_updated(merged);
            if saved {
                self.progress(&format!("[{n}/{total}] Synced {symbol}"));
            } else {
                self.progress(&format!(
                    "[{n}/{total}] Fetched {symbol} but could not save it; will retry next run"
                ));
            }
        }

        self.usage = Some(usage);
    }

    fn save_cache(&self, date: NaiveDate, list: &[MetricSnapshot], unsaved: &HashSet<String>) {
        let result = if unsaved.is_empty() {
            cache::save_stocks(self.cache.as_ref(), date, list)
        } else {
            let durable: Vec<MetricSnapshot> = list
                .iter()
                .filter(|s| !unsaved.contains(&s.symbol))
                .cloned()
                .collect();
            cache::save_stocks(self.cache.as_ref(), date, &durable)
        };
        if let Err(err) = result {
            tracing::warn!(%date, error = %err, "failed to persist stocks cache");
        }
    }

    fn progress(&self, message: &str) {
        self.observer.on_progress(message);
    }
}

/// Union of the cached list and the remote document, keyed by symbol. Cached order is
/// kept; remote-only symbols are appended. A remote entry replaces a cached one only when
/// its serialized content differs. Returns whether anything changed.
pub fn merge_remote(
    cached: Vec<MetricSnapshot>,
    mut remote: DayDocument,
) -> (Vec<MetricSnapshot>, bool) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut changed = false;
    let mut out = Vec::with_capacity(cached.len() + remote.len());

    for local in cached {
        if !seen.insert(local.symbol.clone()) {
            changed = true;
            continue;
        }
        match remote.remove(&local.symbol) {
            Some(incoming) if !same_content(&local, &incoming) => {
                changed = true;
                out.push(incoming);
            }
            _ => out.push(local),
        }
    }

    for (symbol, incoming) in remote {
        if seen.insert(symbol) {
            changed = true;
            out.push(incoming);
        }
    }

    (out, changed)
}

fn same_content(a: &MetricSnapshot, b: &MetricSnapshot) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}

/// Universe entries with no snapshot in `merged`, in universe order, without duplicates.
pub fn pending_symbols<'a>(
    universe: &'a [Instrument],
    merged: &[MetricSnapshot],
) -> Vec<&'a Instrument> {
    let present: HashSet<&str> = merged.iter().map(|s| s.symbol.as_str()).collect();
    let mut queued: HashSet<&str> = HashSet::new();
    universe
        .iter()
        .filter(|i| !present.contains(i.symbol.as_str()) && queued.insert(i.symbol.as_str()))
        .collect()
}
