mod app;
mod assets;
mod config;
mod error;
mod lookup;
mod state;
mod storage;
mod tracker;

use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "calorie_tracker=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;
    info!(
        data_dir = %app_state.config.data_dir.display(),
        key = %app_state.config.storage_key,
        assets_dir = %app_state.config.assets_dir.display(),
        "tracker ready"
    );

    let mut changes = app_state.tracker.lock().await.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let revision = *changes.borrow_and_update();
            debug!(revision, "store changed");
        }
    });

    let app = app::build_app(app_state);
    app::serve(app).await
}
