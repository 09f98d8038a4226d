use std::sync::Arc;

use swarfarm_backend::api;
use swarfarm_backend::config::{self, Config, LOCAL_SUMMONER_ID, LOCAL_USERNAME};
use swarfarm_backend::db::{fixture::Fixture, Database};
use swarfarm_backend::metrics;
use swarfarm_backend::rate_limit::RateLimiter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    config::set_local_mode(config.local_mode);

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");

    if config.local_mode {
        db.ensure_summoner(LOCAL_SUMMONER_ID, LOCAL_USERNAME)
            .await
            .expect("Failed to create local summoner");
        tracing::info!("Local mode enabled, requests act as summoner {LOCAL_SUMMONER_ID}");
    }

    if let Some(path) = &config.fixture_path {
        let fixture = Fixture::from_path(path).expect("Failed to read fixture");
        db.load_fixture(&fixture)
            .await
            .expect("Failed to load fixture");
    }

    metrics::register_metrics();

    let app = api::app(Arc::new(db), RateLimiter::new());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!("SWARFARM planner listening on {addr}");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
