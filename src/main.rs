use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use filing_charts::api::health::HealthState;
use filing_charts::api::latency::LatencyStats;
use filing_charts::api::{router, ApiState};
use filing_charts::cache::{InsiderBuyingCache, InsiderCacheSettings, SystemClock};
use filing_charts::config::Config;
use filing_charts::db::SqliteRepository;
use filing_charts::error::Result;
use filing_charts::state::CompanyDirectory;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", cfg.db_path))?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);
    let repo = SqliteRepository::new(pool);

    // --- Company directory ---
    let directory = CompanyDirectory::new();
    let loaded = repo.load_directory(&directory).await?;
    if loaded == 0 {
        warn!("No visible companies in {}; search and URI resolution will find nothing", cfg.db_path);
    }

    // --- Insider buying cache ---
    let latency = Arc::new(LatencyStats::new());
    let settings = InsiderCacheSettings::from(&cfg);
    info!(
        ttl_secs = settings.ttl.num_seconds(),
        window_days = settings.window_days,
        ttm_policy = ?cfg.ttm_null_policy,
        "Insider cache configured"
    );
    let insider_cache = Arc::new(InsiderBuyingCache::new(
        Arc::new(repo.clone()),
        Arc::new(SystemClock),
        settings,
        Arc::clone(&latency),
    ));

    // Warm the cache so the first page view does not pay for the aggregate query.
    let warm_cache = Arc::clone(&insider_cache);
    tokio::spawn(async move {
        if let Err(e) = warm_cache.populate().await {
            warn!("Insider cache warm-up failed: {e}");
        }
    });

    // --- HTTP API server ---
    let api_state = ApiState {
        repo,
        directory,
        insider_cache,
        latency,
        health: Arc::new(HealthState::new()),
        price_history_start: cfg.price_history_start,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
