//! Pipeline configuration.

/// Env-driven runtime knobs for the orchestrator and scheduler.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Worker-pool size; one job-run per slot
    pub max_workers: usize,
    /// Comma-separated fallback language codes when a request names none
    pub languages: Option<String>,
    /// Still frames extracted from the normalized demo
    pub snapshot_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_workers: 2,
            languages: None,
            snapshot_count: dcast_media::DEFAULT_SNAPSHOT_COUNT,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_workers: std::env::var("PIPELINE_MAX_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(2),
            languages: std::env::var("PIPELINE_LANGUAGES")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            snapshot_count: std::env::var("PIPELINE_SNAPSHOT_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(dcast_media::DEFAULT_SNAPSHOT_COUNT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.snapshot_count, 3);
        assert!(config.languages.is_none());
    }
}
