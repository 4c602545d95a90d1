//! Local key-value cache. Holds today's snapshot list, the macro record and the
//! request usage counter so a run can show data before the remote store answers.

use crate::domain::{MacroIndicatorSnapshot, MetricSnapshot};
use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const MACRO_KEY: &str = "macro_cache";

pub fn stocks_key(date: NaiveDate) -> String {
    format!("stocks_cache_{date}")
}

pub fn usage_key(date: NaiveDate) -> String {
    format!("api_usage_{date}")
}

pub trait KeyValueCache: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create cache dir {} failed", dir.display()))?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(
            !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-')),
            "invalid cache key {key:?}"
        );
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueCache for FileCache {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read cache {} failed", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path(key)?;
        // Write-then-rename so a crash never leaves a truncated entry.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)
            .with_context(|| format!("write cache {} failed", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("replace cache {} failed", path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueCache for MemoryCache {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("memory cache poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("memory cache poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn load_stocks(
    cache: &dyn KeyValueCache,
    date: NaiveDate,
) -> anyhow::Result<Vec<MetricSnapshot>> {
    let key = stocks_key(date);
    let Some(raw) = cache.get(&key)? else {
        return Ok(Vec::new());
    };
    serde_json::from_str(&raw).with_context(|| format!("cache entry {key} is corrupt"))
}

pub fn save_stocks(
    cache: &dyn KeyValueCache,
    date: NaiveDate,
    list: &[MetricSnapshot],
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(list).context("serialize stocks cache failed")?;
    cache.set(&stocks_key(date), &raw)
}

pub fn load_macro(cache: &dyn KeyValueCache) -> anyhow::Result<Option<MacroIndicatorSnapshot>> {
    let Some(raw) = cache.get(MACRO_KEY)? else {
        return Ok(None);
    };
    let m = serde_json::from_str(&raw).context("macro cache entry is corrupt")?;
    Ok(Some(m))
}

pub fn save_macro(
    cache: &dyn KeyValueCache,
    snapshot: &MacroIndicatorSnapshot,
) -> anyhow::Result<()> {
    let raw = serde_json::to_string(snapshot).context("serialize macro cache failed")?;
    cache.set(MACRO_KEY, &raw)
}

/// Missing or unreadable counters start at zero.
pub fn load_usage(cache: &dyn KeyValueCache, date: NaiveDate) -> u32 {
    cache
        .get(&usage_key(date))
        .ok()
        .flatten()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

pub fn save_usage(cache: &dyn KeyValueCache, date: NaiveDate, count: u32) -> anyhow::Result<()> {
    cache.set(&usage_key(date), &count.to_string())
}
