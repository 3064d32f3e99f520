//! Sampling parameters for a generation request

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// Parameters controlling how completions are sampled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Total token budget for prompt plus completion
    pub max_length: usize,
    /// Softmax temperature; 0 selects greedy decoding
    pub temperature: f64,
    /// Number of highest-scoring candidates kept before sampling; 0 keeps all
    pub top_k: usize,
    /// Number of completions to produce
    pub num_return_sequences: usize,
    /// Fixed RNG seed for reproducible sampling
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: 100,
            temperature: 0.7,
            top_k: 50,
            num_return_sequences: 1,
            seed: None,
        }
    }
}

impl GenerationParams {
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_num_return_sequences(mut self, n: usize) -> Self {
        self.num_return_sequences = n;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Reject parameter sets no sampler can honor
    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(CoreError::InvalidRequest(
                "max_length must be at least 1".to_string(),
            ));
        }
        if self.num_return_sequences == 0 {
            return Err(CoreError::InvalidRequest(
                "num_return_sequences must be at least 1".to_string(),
            ));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(CoreError::InvalidRequest(format!(
                "temperature must be a non-negative number, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}
