mod app;
mod auth;
mod config;
mod db;
mod error;
mod middleware;
mod state;
#[cfg(test)]
mod testing;
mod todos;

use crate::state::AppState;

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "taskboard=debug,axum=info,tower_http=info".to_string());
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
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let state = AppState::init().await?;
    let app = app::build_app(state.clone())?;

    let served = app::serve(app, &state.config).await;
    state.shutdown().await;
    served
}
