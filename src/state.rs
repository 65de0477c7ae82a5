use crate::analytics::ReportSettings;
use crate::config::{Config, DataBackend};
use crate::db::postgres::PgSource;
use crate::db::rest::RestSource;
use crate::db::RecordSource;
use crate::services::narrative::{DisabledNarrator, HttpNarrator, NarrativeGenerator};
use crate::services::recommendations::RecommendationSlots;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn RecordSource>,
    pub narrator: Arc<dyn NarrativeGenerator>,
    pub slots: RecommendationSlots,
    pub settings: ReportSettings,
    pool: Option<PgPool>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(
        source: Arc<dyn RecordSource>,
        narrator: Arc<dyn NarrativeGenerator>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            source,
            narrator,
            slots: RecommendationSlots::new(),
            settings,
            pool: None,
        }
    }

    /// Connects the configured backend and narrative relay.
    pub async fn init(config: &Config) -> anyhow::Result<SharedState> {
        let (source, pool): (Arc<dyn RecordSource>, Option<PgPool>) = match &config.backend {
            DataBackend::Rest { url, api_key } => {
                tracing::info!(url = %url, "Using REST data backend");
                (Arc::new(RestSource::new(url, api_key, config.http_timeout)?), None)
            }
            DataBackend::Postgres { url, max_connections } => {
                tracing::info!("Connecting to database...");
                let pool = PgPoolOptions::new()
                    .max_connections(*max_connections)
                    .connect(url)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to connect to database: {}", e);
                        e
                    })?;
                tracing::info!("Database connection established");
                (Arc::new(PgSource::new(pool.clone())), Some(pool))
            }
        };

        let narrator: Arc<dyn NarrativeGenerator> = match &config.narrative_url {
            Some(url) => Arc::new(HttpNarrator::new(url.as_str(), config.http_timeout)?),
            None => {
                tracing::warn!("NARRATIVE_URL not set, recommendations will use the placeholder");
                Arc::new(DisabledNarrator)
            }
        };

        let settings = ReportSettings {
            zone: config.zone,
            counting: config.counting,
        };
        Ok(Arc::new(Self {
            pool,
            ..Self::new(source, narrator, settings)
        }))
    }

    pub async fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
            tracing::info!("Database pool closed");
        }
    }
}
