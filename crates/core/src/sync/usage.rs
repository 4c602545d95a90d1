use crate::storage::cache::{self, KeyValueCache};
use chrono::NaiveDate;

/// Upstream requests made on one date, persisted in the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCounter {
    date: NaiveDate,
    count: u32,
}

impl UsageCounter {
    pub fn load(cache: &dyn KeyValueCache, date: NaiveDate) -> Self {
        Self {
            date,
            count: cache::load_usage(cache, date),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Count one request. A failed persist is logged; the in-memory count still advances.
    pub fn increment(&mut self, cache: &dyn KeyValueCache) -> u32 {
        self.count = self.count.saturating_add(1);
        if let Err(err) = cache::save_usage(cache, self.date, self.count) {
            tracing::warn!(date = %self.date, error = %err, "failed to persist usage counter");
        }
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::cache::MemoryCache;

    #[test]
    fn counter_resumes_from_cache() {
        let cache = MemoryCache::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();

        let mut usage = UsageCounter::load(&cache, date);
        assert_eq!(usage.count(), 0);
        usage.increment(&cache);
        usage.increment(&cache);

        let reloaded = UsageCounter::load(&cache, date);
        assert_eq!(reloaded.count(), 2);

        let other_day = UsageCounter::load(&cache, date.succ_opt().unwrap());
        assert_eq!(other_day.count(), 0);
    }
}
