use bloomgen_core::GenerationParams;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// bloomgen configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomgenConfig {
    /// Where the pretrained model comes from
    pub checkpoint: CheckpointConfig,

    /// Parameters applied to every prompt submitted from the UI
    pub generation: GenerationParams,

    /// Log level
    pub log_level: String,
}

impl Default for BloomgenConfig {
    fn default() -> Self {
        Self {
            checkpoint: CheckpointConfig::default(),
            generation: GenerationParams::default(),
            log_level: "info".to_string(),
        }
    }
}

impl BloomgenConfig {
    /// Load from configuration file
    pub fn load_from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))
    }
}

/// Checkpoint location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// HuggingFace repository ID
    pub repo_id: String,

    /// Branch, tag or commit
    pub revision: String,

    /// Local `config.json`; when set, weights are read from `weight_files`
    /// instead of the hub
    pub config_file: Option<PathBuf>,

    /// Local `tokenizer.json`
    pub tokenizer_file: Option<PathBuf>,

    /// Local safetensors shards
    pub weight_files: Vec<PathBuf>,

    /// HuggingFace access token
    pub hf_token: Option<String>,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            repo_id: "bigscience/bloom-560m".to_string(),
            revision: "main".to_string(),
            config_file: None,
            tokenizer_file: None,
            weight_files: vec![],
            hf_token: None,
        }
    }
}
