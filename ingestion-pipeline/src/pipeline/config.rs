use std::time::Duration;

use common::utils::config::AppConfig;
use tracing::warn;

/// Shortest timeout a run accepts. A zero timeout would fail every call.
const MIN_TIMEOUT_SECS: u64 = 1;

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    pub extraction_timeout: Duration,
    pub analysis_timeout: Duration,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            extraction_timeout: Duration::from_secs(60),
            analysis_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
    /// Object store prefix under which original uploads are archived.
    pub archive_namespace: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            tuning: IngestionTuning::default(),
            archive_namespace: "fylex/documents".to_string(),
        }
    }
}

impl IngestionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: IngestionTuning {
                extraction_timeout: clamped_timeout(
                    "extraction_timeout_secs",
                    config.extraction_timeout_secs,
                ),
                analysis_timeout: clamped_timeout(
                    "analysis_timeout_secs",
                    config.analysis_timeout_secs,
                ),
            },
            archive_namespace: config.archive_namespace.trim_matches('/').to_string(),
        }
    }
}

fn clamped_timeout(setting: &'static str, secs: u64) -> Duration {
    if secs < MIN_TIMEOUT_SECS {
        warn!(
            setting,
            configured = secs,
            applied = MIN_TIMEOUT_SECS,
            "timeout below minimum, clamping"
        );
    }
    Duration::from_secs(secs.max(MIN_TIMEOUT_SECS))
}
