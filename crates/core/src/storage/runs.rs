//! Append-only ledger of sync runs.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SyncRunRecord<'a> {
    pub as_of_date: NaiveDate,
    pub provider: &'a str,
    pub status: &'a str,
    pub fetched: usize,
    pub skipped: usize,
    pub requests_used: u32,
    pub error: Option<&'a str>,
    pub report: Option<Value>,
}

fn clamp_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

pub async fn record_sync_run(pool: &sqlx::PgPool, run: SyncRunRecord<'_>) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let finished_at: DateTime<Utc> = Utc::now();
    let requests_used = i32::try_from(run.requests_used).unwrap_or(i32::MAX);

    sqlx::query(
        "INSERT INTO sync_runs \
         (id, as_of_date, finished_at, provider, status, fetched, skipped, requests_used, error, report) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .persistent(false)
    .bind(id)
    .bind(run.as_of_date)
    .bind(finished_at)
    .bind(run.provider)
    .bind(run.status)
    .bind(clamp_i32(run.fetched))
    .bind(clamp_i32(run.skipped))
    .bind(requests_used)
    .bind(run.error)
    .bind(run.report)
    .execute(pool)
    .await
    .context("insert sync_runs failed")?;

    Ok(id)
}
