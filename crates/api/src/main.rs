use advisor_core::config::Settings;
use advisor_core::domain::{CclHistory, DayDocument, MacroIndicatorSnapshot, MetricSnapshot};
use advisor_core::scoring::{self, Analysis, Horizon, ScoringConfig, Signal};
use advisor_core::storage::documents::{self, DocumentStore};
use advisor_core::storage::postgres::PgDocumentStore;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

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

    let scoring = settings.scoring_config()?;
    let store = connect_store(&settings).await;

    let state = AppState {
        store,
        scoring: Arc::new(scoring),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/snapshots/latest", get(get_latest_snapshots))
        .route("/snapshots/:as_of_date", get(get_snapshots_by_date))
        .route("/signals/:as_of_date", get(get_signals_by_date))
        .route("/signals/:as_of_date/:symbol", get(get_symbol_signals))
        .route("/macro", get(get_macro))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Without a usable database the API still starts; data endpoints answer 503.
async fn connect_store(settings: &Settings) -> Option<Arc<dyn DocumentStore>> {
    let db_url = match settings.require_database_url() {
        Ok(url) => url,
        Err(e) => {
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            return None;
        }
    };

    let pool = match sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
            return None;
        }
    };

    match advisor_core::storage::migrate(&pool).await {
        Ok(()) => Some(Arc::new(PgDocumentStore::new(pool))),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
            None
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    store: Option<Arc<dyn DocumentStore>>,
    scoring: Arc<ScoringConfig>,
}

impl AppState {
    fn store(&self) -> Result<&dyn DocumentStore, StatusCode> {
        self.store
            .as_deref()
            .ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DaySnapshots {
    date: NaiveDate,
    snapshots: DayDocument,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignalRow {
    symbol: String,
    name: String,
    price: f64,
    signal: Signal,
    score: i32,
    reasons: Vec<scoring::ScoredReason>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignalBoard {
    date: NaiveDate,
    horizon: Horizon,
    table: &'static str,
    signals: Vec<SignalRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SymbolSignals {
    date: NaiveDate,
    symbol: String,
    name: String,
    short: Analysis,
    long: Analysis,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MacroView {
    latest: Option<MacroIndicatorSnapshot>,
    ccl_history: CclHistory,
}

#[derive(Debug, Deserialize)]
struct SignalQuery {
    #[serde(default)]
    horizon: Horizon,
}

fn parse_date(raw: &str) -> Result<NaiveDate, StatusCode> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| StatusCode::BAD_REQUEST)
}

fn internal(err: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&err);
    tracing::error!(error = %format!("{err:#}"), "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn load_day(store: &dyn DocumentStore, date: NaiveDate) -> Result<DayDocument, StatusCode> {
    documents::read_day(store, date)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)
}

/// Score a day's snapshots and order them best-first.
fn signal_board(
    date: NaiveDate,
    day: DayDocument,
    horizon: Horizon,
    config: &ScoringConfig,
) -> SignalBoard {
    let snapshots: Vec<MetricSnapshot> = day.into_values().collect();
    let signals = scoring::rank(&snapshots, horizon, config)
        .into_iter()
        .map(|(s, analysis)| SignalRow {
            symbol: s.symbol.clone(),
            name: s.name.clone(),
            price: s.price,
            signal: analysis.signal,
            score: analysis.score,
            reasons: analysis.reasons,
        })
        .collect();
    SignalBoard {
        date,
        horizon,
        table: config.revision,
        signals,
    }
}

async fn get_latest_snapshots(
    State(state): State<AppState>,
) -> Result<Json<DaySnapshots>, StatusCode> {
    let store = state.store()?;
    let (date, snapshots) = documents::latest_day(store)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(DaySnapshots { date, snapshots }))
}

async fn get_snapshots_by_date(
    State(state): State<AppState>,
    Path(as_of_date): Path<String>,
) -> Result<Json<DaySnapshots>, StatusCode> {
    let store = state.store()?;
    let date = parse_date(&as_of_date)?;
    let snapshots = load_day(store, date).await?;
    Ok(Json(DaySnapshots { date, snapshots }))
}

async fn get_signals_by_date(
    State(state): State<AppState>,
    Path(as_of_date): Path<String>,
    Query(query): Query<SignalQuery>,
) -> Result<Json<SignalBoard>, StatusCode> {
    let store = state.store()?;
    let date = parse_date(&as_of_date)?;
    let day = load_day(store, date).await?;
    Ok(Json(signal_board(date, day, query.horizon, &state.scoring)))
}

async fn get_symbol_signals(
    State(state): State<AppState>,
    Path((as_of_date, symbol)): Path<(String, String)>,
) -> Result<Json<SymbolSignals>, StatusCode> {
    let store = state.store()?;
    let date = parse_date(&as_of_date)?;
    let mut day = load_day(store, date).await?;
    let snapshot = day
        .remove(&symbol.trim().to_ascii_uppercase())
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(SymbolSignals {
        date,
        short: scoring::score(&snapshot, Horizon::Short, &state.scoring),
        long: scoring::score(&snapshot, Horizon::Long, &state.scoring),
        symbol: snapshot.symbol,
        name: snapshot.name,
    }))
}

async fn get_macro(State(state): State<AppState>) -> Result<Json<MacroView>, StatusCode> {
    let store = state.store()?;
    let latest = documents::read_macro(store).await.map_err(internal)?;
    let ccl_history = documents::read_ccl_history(store).await.map_err(internal)?;
    Ok(Json(MacroView {
        latest,
        ccl_history,
    }))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(symbol: &str, price: &str, ema20: &str, rsi: &str) -> MetricSnapshot {
        serde_json::from_value(json!({
            "symbol": symbol,
            "name": format!("{symbol} Inc."),
            "price": price,
            "change": "0.00",
            "changePercent": "0.00",
            "sma50": null,
            "ema20": ema20,
            "sma200": null,
            "rsi": rsi,
            "support": "0.00",
            "resistance": "0.00",
            "peRatio": "N/A",
            "epsGrowth": "N/A"
        }))
        .unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    #[test]
    fn board_is_ranked_best_first() {
        let mut day = DayDocument::new();
        day.insert("AAPL".into(), snapshot("AAPL", "90.00", "100.00", "75.00"));
        day.insert("MSFT".into(), snapshot("MSFT", "110.00", "100.00", "25.00"));
        day.insert("KO".into(), snapshot("KO", "100.00", "99.00", "50.00"));

        let config = ScoringConfig::default();
        let board = signal_board(date(), day, Horizon::Short, &config);

        let order: Vec<&str> = board.signals.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["MSFT", "KO", "AAPL"]);
        assert!(board.signals[0].score > board.signals[2].score);
        assert_eq!(board.table, ScoringConfig::REVISED);
    }

    #[test]
    fn board_serializes_camel_case() {
        let mut day = DayDocument::new();
        day.insert("KO".into(), snapshot("KO", "100.00", "99.00", "50.00"));
        let board = signal_board(date(), day, Horizon::Long, &ScoringConfig::baseline());

        let v = serde_json::to_value(&board).unwrap();
        assert_eq!(v["horizon"], "long");
        assert_eq!(v["table"], "baseline");
        assert_eq!(v["signals"][0]["symbol"], "KO");
        assert!(v["signals"][0]["reasons"].is_array());
    }

    #[test]
    fn signal_query_defaults_to_short() {
        let q: SignalQuery = serde_json::from_value(json!({})).unwrap();
        assert_eq!(q.horizon, Horizon::Short);
        let q: SignalQuery = serde_json::from_value(json!({"horizon": "long"})).unwrap();
        assert_eq!(q.horizon, Horizon::Long);
    }
}
