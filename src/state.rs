use crate::analysis::{probe::HttpProbe, vision::OpenAiVision, MealAnalyzer};
use crate::config::AppConfig;
use crate::storage::{Storage, StorageClient};
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub analyzer: Arc<MealAnalyzer>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let storage = Arc::new(Storage::new(&config.storage).await?) as Arc<dyn StorageClient>;
        let probe = Arc::new(HttpProbe::new(config.inference.timeout_secs)?);
        let vision = Arc::new(OpenAiVision::new(&config.inference)?);
        if config.inference.api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set; meal analysis requests will fail");
        }

        let analyzer = Arc::new(MealAnalyzer::new(storage, probe, vision));
        Ok(Self::from_parts(db, config, analyzer))
    }

    pub fn from_parts(db: PgPool, config: Arc<AppConfig>, analyzer: Arc<MealAnalyzer>) -> Self {
        Self {
            db,
            config,
            analyzer,
        }
    }
}
