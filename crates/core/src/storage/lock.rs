use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};

// Session-scoped advisory lock. Keeps two sync runs for the same date from interleaving writes.
const LOCK_NAMESPACE: i64 = 0x4144_5653_5943; // "ADVSYC"

fn lock_key_for_date(as_of_date: NaiveDate) -> i64 {
    LOCK_NAMESPACE ^ i64::from(as_of_date.num_days_from_ce())
}

/// Holds the per-date advisory lock. The lock belongs to the Postgres session, so the
/// connection that took it is kept out of the pool until `release`.
pub struct SyncLock {
    conn: PoolConnection<Postgres>,
    key: i64,
}

impl SyncLock {
    /// `None` when another session already holds the lock for `as_of_date`.
    pub async fn try_acquire(
        pool: &PgPool,
        as_of_date: NaiveDate,
    ) -> anyhow::Result<Option<Self>> {
        let key = lock_key_for_date(as_of_date);
        let mut conn = pool
            .acquire()
            .await
            .context("failed to check out a connection for the sync lock")?;
        let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .persistent(false)
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("failed to acquire sync lock (key={key})"))?;
        Ok(acquired.0.then_some(Self { conn, key }))
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    pub async fn release(mut self) -> anyhow::Result<()> {
        let key = self.key;
        let released: (bool,) = sqlx::query_as("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(key)
            .fetch_one(&mut *self.conn)
            .await
            .with_context(|| format!("failed to release sync lock (key={key})"))?;
        anyhow::ensure!(released.0, "sync lock (key={key}) was not held by this session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_differ_per_date() {
        let a = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        assert_ne!(lock_key_for_date(a), lock_key_for_date(b));
        assert_eq!(lock_key_for_date(a), lock_key_for_date(a));
    }

    #[test]
    fn keys_stay_inside_the_namespace() {
        let far = NaiveDate::from_ymd_opt(2999, 12, 31).unwrap();
        assert_eq!(lock_key_for_date(far) >> 32, LOCK_NAMESPACE >> 32);
    }
}
