use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    pub http_port: u16,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    pub analysis_service_url: String,
    #[serde(default = "default_analysis_timeout_secs")]
    pub analysis_timeout_secs: u64,
    #[serde(default = "default_extraction_timeout_secs")]
    pub extraction_timeout_secs: u64,
    #[serde(default)]
    pub analysis_retry_attempts: usize,
    #[serde(default = "default_archive_namespace")]
    pub archive_namespace: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_analysis_timeout_secs() -> u64 {
    120
}

fn default_extraction_timeout_secs() -> u64 {
    60
}

fn default_archive_namespace() -> String {
    "fylex/documents".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            surrealdb_address: "mem://".to_string(),
            surrealdb_username: "root".to_string(),
            surrealdb_password: "root".to_string(),
            surrealdb_namespace: "fylex".to_string(),
            surrealdb_database: "fylex".to_string(),
            data_dir: default_data_dir(),
            http_port: 3000,
            storage: default_storage_kind(),
            analysis_service_url: "http://localhost:8000/ml/service/analysis".to_string(),
            analysis_timeout_secs: default_analysis_timeout_secs(),
            extraction_timeout_secs: default_extraction_timeout_secs(),
            analysis_retry_attempts: 0,
            archive_namespace: default_archive_namespace(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
