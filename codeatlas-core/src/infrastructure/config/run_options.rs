// codeatlas-core/src/infrastructure/config/run_options.rs
//
// `RunOptions` (spec.md §6) loaded from a YAML project config file: a
// `find_main_config` search, a base parse, environment-variable
// overrides, then `validator`-derived validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

use crate::domain::file::SpecialFilePatternSpec;
use crate::infrastructure::error::InfrastructureError;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunOptions {
    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default = "default_max_file_bytes")]
    #[validate(range(min = 1))]
    pub max_file_bytes: u64,

    #[serde(default = "default_max_llm_concurrency")]
    #[validate(range(min = 1))]
    pub max_llm_concurrency: usize,

    #[serde(default = "default_accept_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub accept_threshold: f64,

    #[serde(default = "default_quiet_window_secs")]
    pub quiet_window_secs: u64,

    #[serde(default)]
    pub special_file_patterns: Vec<SpecialFilePatternSpec>,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub rel_store: RelStoreConfig,

    #[serde(default)]
    pub graph_store: GraphStoreConfig,

    #[serde(default)]
    pub queue: QueueConfig,
}

impl RunOptions {
    pub fn quiet_window(&self) -> Duration {
        Duration::from_secs(self.quiet_window_secs)
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            max_file_bytes: default_max_file_bytes(),
            max_llm_concurrency: default_max_llm_concurrency(),
            accept_threshold: default_accept_threshold(),
            quiet_window_secs: default_quiet_window_secs(),
            special_file_patterns: Vec::new(),
            llm: LlmConfig::default(),
            rel_store: RelStoreConfig::default(),
            graph_store: GraphStoreConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

fn default_max_file_bytes() -> u64 {
    1_048_576
}

fn default_max_llm_concurrency() -> usize {
    8
}

fn default_accept_threshold() -> f64 {
    0.5
}

fn default_quiet_window_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            api_key: String::new(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelStoreConfig {
    #[serde(default = "default_rel_store_path")]
    pub path: String,
}

fn default_rel_store_path() -> String {
    "codeatlas.db".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphStoreConfig {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueConfig {
    #[serde(default)]
    pub broker_url: String,
}

#[instrument(skip(project_dir))]
pub fn load_run_options(project_dir: &Path) -> Result<RunOptions, InfrastructureError> {
    let config_path = find_main_config(project_dir)?;
    info!(path = ?config_path, "Loading pipeline configuration");

    let content = std::fs::read_to_string(&config_path).map_err(InfrastructureError::Io)?;
    let mut options: RunOptions = serde_yaml::from_str(&content)?;

    apply_env_overrides(&mut options);

    options
        .validate()
        .map_err(|e| InfrastructureError::Config(e.to_string()))?;

    Ok(options)
}

fn find_main_config(root: &Path) -> Result<PathBuf, InfrastructureError> {
    let candidates = ["codeatlas.yaml", "codeatlas.yml"];
    for filename in candidates {
        let p = root.join(filename);
        if p.exists() {
            return Ok(p);
        }
    }
    Err(InfrastructureError::ConfigNotFound(format!(
        "No configuration file found in {:?}. Checked: {:?}",
        root, candidates
    )))
}

fn apply_env_overrides(options: &mut RunOptions) {
    if let Ok(val) = std::env::var("CODEATLAS_MAX_LLM_CONCURRENCY") {
        if let Ok(parsed) = val.parse() {
            info!(old = options.max_llm_concurrency, new = parsed, "Overriding max_llm_concurrency via ENV");
            options.max_llm_concurrency = parsed;
        }
    }
    if let Ok(val) = std::env::var("CODEATLAS_ACCEPT_THRESHOLD") {
        if let Ok(parsed) = val.parse() {
            info!(old = options.accept_threshold, new = parsed, "Overriding accept_threshold via ENV");
            options.accept_threshold = parsed;
        }
    }
    if let Ok(val) = std::env::var("CODEATLAS_LLM_API_KEY") {
        options.llm.api_key = val;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_spec() {
        let options = RunOptions::default();
        assert_eq!(options.max_file_bytes, 1_048_576);
        assert_eq!(options.accept_threshold, 0.5);
        assert_eq!(options.quiet_window_secs, 30);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut options = RunOptions::default();
        options.accept_threshold = 1.5;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_deserializes_minimal_yaml() {
        let yaml = "max_file_bytes: 2048\n";
        let options: RunOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options.max_file_bytes, 2048);
        assert_eq!(options.max_llm_concurrency, 8);
    }
}
