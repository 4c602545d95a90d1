use advisor_core::config::Settings;
use advisor_core::ingest::{AlphaVantageClient, HttpMacroFeed, MarketFeed};
use advisor_core::storage::cache::{FileCache, KeyValueCache};
use advisor_core::storage::documents::DocumentStore;
use advisor_core::storage::lock::SyncLock;
use advisor_core::storage::memory::MemoryDocumentStore;
use advisor_core::storage::postgres::PgDocumentStore;
use advisor_core::storage::runs::{record_sync_run, SyncRunRecord};
use advisor_core::sync::{
    MacroSync, SyncObserver, SyncOptions, SyncPipeline, SyncReport, SyncStatus, TracingObserver,
};
use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod universe;

#[derive(Debug, Parser)]
#[command(name = "advisor_worker")]
struct Args {
    /// Date to sync (YYYY-MM-DD). Defaults to today's UTC date.
    #[arg(long)]
    as_of_date: Option<String>,

    /// Run against an in-memory store instead of the database. Upstream requests and the
    /// local cache are still used.
    #[arg(long)]
    dry_run: bool,

    /// Skip the macro indicator sync.
    #[arg(long)]
    skip_macro: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(&settings, &args).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "sync run failed");
    }
    result
}

async fn run(settings: &Settings, args: &Args) -> anyhow::Result<()> {
    let as_of_date =
        advisor_core::time::resolve_as_of_date(args.as_of_date.as_deref(), Utc::now())?;
    let universe = universe::build_universe(settings.symbols.as_deref())?;

    // A missing key ends the process before anything else runs.
    let feed: Arc<dyn MarketFeed> = Arc::new(AlphaVantageClient::from_settings(settings)?);
    let cache: Arc<dyn KeyValueCache> = Arc::new(FileCache::open(&settings.cache_dir)?);
    let observer: Arc<dyn SyncObserver> = Arc::new(TracingObserver);

    tracing::info!(
        %as_of_date,
        dry_run = args.dry_run,
        universe_len = universe.len(),
        cache_dir = %settings.cache_dir,
        "starting sync"
    );

    let pool = if args.dry_run {
        None
    } else {
        let db_url = settings.require_database_url()?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
            .context("connect DATABASE_URL failed")?;
        advisor_core::storage::migrate(&pool).await?;
        Some(pool)
    };

    let store: Arc<dyn DocumentStore> = match &pool {
        Some(pool) => Arc::new(PgDocumentStore::new(pool.clone())),
        None => Arc::new(MemoryDocumentStore::new()),
    };

    let lock = match &pool {
        Some(pool) => match SyncLock::try_acquire(pool, as_of_date).await? {
            Some(lock) => Some(lock),
            None => {
                tracing::warn!(%as_of_date, "sync lock not acquired; another run in progress");
                return Ok(());
            }
        },
        None => None,
    };

    let options = SyncOptions {
        cooldown: settings.sync_cooldown(),
        ..SyncOptions::default()
    };
    let mut pipeline = SyncPipeline::new(
        feed.clone(),
        store.clone(),
        cache.clone(),
        observer.clone(),
        options,
    );
    let outcome = pipeline.run(as_of_date, &universe).await;

    if let Ok(report) = &outcome {
        if !args.skip_macro && report.status != SyncStatus::Disabled {
            sync_macro(settings, as_of_date, store.clone(), cache, observer).await;
        }
    }

    if let Some(pool) = &pool {
        if let Err(err) = record_run(pool, as_of_date, feed.provider_name(), &outcome).await {
            tracing::warn!(%as_of_date, error = %err, "failed to record sync run");
        }
    }
    if let Some(lock) = lock {
        let key = lock.key();
        if let Err(err) = lock.release().await {
            tracing::warn!(%as_of_date, key, error = %err, "failed to release sync lock");
        }
    }

    let report = outcome?;
    if args.dry_run {
        let summary = serde_json::to_string_pretty(&report).context("serialize report failed")?;
        println!("{summary}");
    }
    if report.status == SyncStatus::Disabled {
        anyhow::bail!("upstream rejected the API key; sync disabled for {as_of_date}");
    }
    Ok(())
}

async fn sync_macro(
    settings: &Settings,
    as_of_date: NaiveDate,
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn KeyValueCache>,
    observer: Arc<dyn SyncObserver>,
) {
    let feed = match HttpMacroFeed::from_settings(settings) {
        Ok(feed) => feed,
        Err(err) => {
            tracing::warn!(error = %err, "macro feed unavailable; skipping macro sync");
            return;
        }
    };
    let report = MacroSync::new(Arc::new(feed), store, cache, observer)
        .run(as_of_date, Utc::now())
        .await;
    tracing::info!(
        %as_of_date,
        buffett = report.buffett,
        ccl = report.ccl,
        written = report.written,
        "macro sync finished"
    );
}

async fn record_run(
    pool: &sqlx::PgPool,
    as_of_date: NaiveDate,
    provider: &str,
    outcome: &anyhow::Result<SyncReport>,
) -> anyhow::Result<()> {
    let message = outcome.as_ref().err().map(|e| format!("{e:#}"));
    let run = match outcome {
        Ok(report) => SyncRunRecord {
            as_of_date,
            provider,
            status: report.status.as_str(),
            fetched: report.fetched,
            skipped: report.skipped,
            requests_used: report.requests,
            error: None,
            report: serde_json::to_value(report).ok(),
        },
        Err(_) => SyncRunRecord {
            as_of_date,
            provider,
            status: "error",
            fetched: 0,
            skipped: 0,
            requests_used: 0,
            error: message.as_deref(),
            report: None,
        },
    };
    let run_id = record_sync_run(pool, run).await?;
    tracing::info!(%as_of_date, %run_id, "recorded sync run");
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
