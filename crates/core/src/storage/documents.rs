//! Remote document store: collections of JSON documents addressed by id, with
//! merge-writes that union top-level keys into the stored document.

use crate::domain::{CclHistory, DayDocument, MacroIndicatorSnapshot, MetricSnapshot};
use anyhow::Context;
use chrono::NaiveDate;
use serde_json::{Map, Value};

pub const STOCKS: &str = "stocks";
pub const MACRO: &str = "macro";
pub const MACRO_LATEST: &str = "latest";
pub const CCL_HISTORY: &str = "ccl_history";

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn read(&self, collection: &str, doc_id: &str) -> anyhow::Result<Option<Value>>;

    /// Union `patch` into the document's top-level keys, creating it if absent. Keys not
    /// in `patch` are left untouched.
    async fn merge(
        &self,
        collection: &str,
        doc_id: &str,
        patch: Map<String, Value>,
    ) -> anyhow::Result<()>;

    /// Greatest document id in the collection. Ids in `stocks` are ISO dates, so this is
    /// the most recent day.
    async fn latest_id(&self, collection: &str) -> anyhow::Result<Option<String>>;
}

/// Read one day's document. Entries that do not parse are dropped (and will be
/// backfilled as missing).
pub async fn read_day(
    store: &dyn DocumentStore,
    date: NaiveDate,
) -> anyhow::Result<Option<DayDocument>> {
    let Some(body) = store.read(STOCKS, &date.to_string()).await? else {
        return Ok(None);
    };
    Ok(Some(parse_day(date, body)?))
}

pub async fn latest_day(
    store: &dyn DocumentStore,
) -> anyhow::Result<Option<(NaiveDate, DayDocument)>> {
    let Some(id) = store.latest_id(STOCKS).await? else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(&id, "%Y-%m-%d")
        .with_context(|| format!("stocks document id is not a date: {id:?}"))?;
    Ok(read_day(store, date).await?.map(|doc| (date, doc)))
}

fn parse_day(date: NaiveDate, body: Value) -> anyhow::Result<DayDocument> {
    let Value::Object(entries) = body else {
        anyhow::bail!("stocks/{date} is not an object");
    };

    let mut out = DayDocument::new();
    for (symbol, entry) in entries {
        match serde_json::from_value::<MetricSnapshot>(entry) {
            Ok(snapshot) => {
                out.insert(symbol, snapshot);
            }
            Err(err) => {
                tracing::warn!(%date, %symbol, error = %err, "dropping unparseable stored snapshot");
            }
        }
    }
    Ok(out)
}

/// Single-symbol merge-write into the day's document.
pub async fn merge_snapshot(
    store: &dyn DocumentStore,
    date: NaiveDate,
    snapshot: &MetricSnapshot,
) -> anyhow::Result<()> {
    let value = serde_json::to_value(snapshot).context("serialize snapshot failed")?;
    let mut patch = Map::new();
    patch.insert(snapshot.symbol.clone(), value);
    store
        .merge(STOCKS, &date.to_string(), patch)
        .await
        .with_context(|| format!("merge stocks/{date} ({}) failed", snapshot.symbol))
}

pub async fn read_macro(
    store: &dyn DocumentStore,
) -> anyhow::Result<Option<MacroIndicatorSnapshot>> {
    let Some(body) = store.read(MACRO, MACRO_LATEST).await? else {
        return Ok(None);
    };
    let snapshot = serde_json::from_value(body).context("parse macro/latest failed")?;
    Ok(Some(snapshot))
}

pub async fn merge_macro(
    store: &dyn DocumentStore,
    snapshot: &MacroIndicatorSnapshot,
) -> anyhow::Result<()> {
    let Value::Object(patch) =
        serde_json::to_value(snapshot).context("serialize macro snapshot failed")?
    else {
        anyhow::bail!("macro snapshot did not serialize to an object");
    };
    store
        .merge(MACRO, MACRO_LATEST, patch)
        .await
        .context("merge macro/latest failed")
}

pub async fn read_ccl_history(store: &dyn DocumentStore) -> anyhow::Result<CclHistory> {
    let Some(body) = store.read(MACRO, CCL_HISTORY).await? else {
        return Ok(CclHistory::new());
    };
    serde_json::from_value(body).context("parse macro/ccl_history failed")
}

pub async fn merge_ccl_point(
    store: &dyn DocumentStore,
    date: NaiveDate,
    value: f64,
) -> anyhow::Result<()> {
    let mut patch = Map::new();
    patch.insert(date.to_string(), Value::from(value));
    store
        .merge(MACRO, CCL_HISTORY, patch)
        .await
        .with_context(|| format!("merge macro/ccl_history ({date}) failed"))
}
