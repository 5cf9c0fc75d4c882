use std::sync::Arc;

use common::{
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::config::AppConfig,
};
use ingestion_pipeline::IngestionPipeline;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub pipeline: Arc<IngestionPipeline>,
}

impl ApiState {
    pub async fn new(
        config: &AppConfig,
        storage: StorageManager,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        surreal_db_client.ensure_initialized().await?;

        Ok(Self::with_db(surreal_db_client, config, storage))
    }

    /// Builds the state around an already initialized database handle.
    pub fn with_db(db: Arc<SurrealDbClient>, config: &AppConfig, storage: StorageManager) -> Self {
        let pipeline = Arc::new(IngestionPipeline::new(Arc::clone(&db), config, storage));

        Self {
            db,
            config: config.clone(),
            pipeline,
        }
    }
}
