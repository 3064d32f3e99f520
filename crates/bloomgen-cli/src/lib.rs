//! bloomgen CLI library

pub mod commands;
pub mod error;
pub mod gui;

use bloomgen::{BloomgenConfig, GenerationParams};
use error::CliError;
use std::path::{Path, PathBuf};

/// Name the app reports in metadata and logs
pub const APP_NAME: &str = "bloomgen";

/// Per-invocation overrides of the configured generation parameters
#[derive(Debug, Clone, Default, clap::Args)]
pub struct GenerationArgs {
    /// Total token budget for prompt plus completion
    #[arg(long, global = true)]
    pub max_length: Option<usize>,

    /// Sampling temperature (0 = greedy)
    #[arg(long, global = true)]
    pub temperature: Option<f64>,

    /// Number of candidate tokens kept before sampling (0 = all)
    #[arg(long, global = true)]
    pub top_k: Option<usize>,

    /// Number of completions to produce
    #[arg(long, short = 'n', global = true)]
    pub num_return_sequences: Option<usize>,

    /// Fixed RNG seed for reproducible output
    #[arg(long, global = true)]
    pub seed: Option<u64>,
}

impl GenerationArgs {
    pub fn apply(&self, params: &mut GenerationParams) {
        if let Some(max_length) = self.max_length {
            params.max_length = max_length;
        }
        if let Some(temperature) = self.temperature {
            params.temperature = temperature;
        }
        if let Some(top_k) = self.top_k {
            params.top_k = top_k;
        }
        if let Some(n) = self.num_return_sequences {
            params.num_return_sequences = n;
        }
        if self.seed.is_some() {
            params.seed = self.seed;
        }
    }
}

/// `$CONFIG_DIR/bloomgen/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bloomgen").join("config.toml"))
}

/// Load the explicit config file, else the default one if it exists, else
/// built-in defaults
pub fn load_config(path: Option<&Path>) -> Result<BloomgenConfig, CliError> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path().filter(|p| p.exists()),
    };

    match path {
        Some(path) => BloomgenConfig::load_from_file(&path)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e))),
        None => Ok(BloomgenConfig::default()),
    }
}
