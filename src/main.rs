mod ai_logs;
mod analysis;
mod app;
mod auth;
mod config;
mod errors;
mod goals;
mod meals;
mod state;
mod storage;

/// `RUST_LOG` filters, `LOG_FORMAT=json` emits one JSON object per line.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mealscan=debug,axum=info,tower_http=info".into());
    let fmt = tracing_subscriber::fmt().with_env_filter(filter);
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => fmt.with_target(false).json().init(),
        _ => fmt.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let app_state = state::AppState::init().await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&app_state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing with existing schema");
    }

    app::serve(app::build_app(app_state)).await
}
