use anyhow::Context;

pub mod cache;
pub mod documents;
pub mod lock;
pub mod memory;
pub mod postgres;
pub mod runs;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}
