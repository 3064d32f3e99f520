//! Candle-backed [`Generator`] implementation

use async_trait::async_trait;
use bloomgen_core::{
    CompletionSet, CoreError, GenerationRequest, Generator, GeneratorMetadata,
    Result as CoreResult,
};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;

use crate::bloom::{Bloom, Config};
use crate::hub::Checkpoint;
use crate::sampling::{CausalLm, SamplingEngine, SpecialTokens};
use crate::CandleError;

const EOS_TOKEN: &str = "</s>";

/// Model source variants
#[derive(Clone)]
pub enum ModelSource {
    /// Local `config.json` and safetensors shards
    Files {
        config: PathBuf,
        weights: Vec<PathBuf>,
    },
    /// Download from HuggingFace
    HuggingFace(Checkpoint),
    /// Use a config with zero weights
    Config(Config),
}

/// Tokenizer source variants
#[allow(clippy::large_enum_variant)]
#[derive(Clone)]
pub enum TokenizerSource {
    /// Load from file
    File(PathBuf),
    /// Use pre-loaded tokenizer
    Instance(Tokenizer),
    /// Take `tokenizer.json` from wherever the model comes from
    Default,
}

/// Builder for [`BloomGenerator`]
#[derive(Clone)]
pub struct BloomGeneratorBuilder {
    name: String,
    model_source: ModelSource,
    tokenizer_source: TokenizerSource,
    device: Device,
    dtype: DType,
    hf_token: Option<String>,
}

impl Default for BloomGeneratorBuilder {
    fn default() -> Self {
        Self {
            name: "bloom".to_string(),
            model_source: ModelSource::HuggingFace(Checkpoint::default()),
            tokenizer_source: TokenizerSource::Default,
            device: Device::Cpu,
            dtype: DType::F32,
            hf_token: None,
        }
    }
}

impl BloomGeneratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set model from HuggingFace
    pub fn with_checkpoint(mut self, repo_id: impl Into<String>, revision: impl Into<String>) -> Self {
        self.model_source = ModelSource::HuggingFace(Checkpoint::new(repo_id, revision));
        self
    }

    /// Set model from local files
    pub fn with_model_files(
        mut self,
        config: impl Into<PathBuf>,
        weights: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.model_source = ModelSource::Files {
            config: config.into(),
            weights: weights.into_iter().map(Into::into).collect(),
        };
        self
    }

    /// Set model from config (zero weights)
    pub fn with_model_config(mut self, config: Config) -> Self {
        self.model_source = ModelSource::Config(config);
        self
    }

    /// Set tokenizer from file
    pub fn with_tokenizer_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.tokenizer_source = TokenizerSource::File(path.into());
        self
    }

    /// Set tokenizer instance
    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer_source = TokenizerSource::Instance(tokenizer);
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    /// Access token for gated or private repositories
    pub fn with_hf_token(mut self, token: Option<String>) -> Self {
        self.hf_token = token;
        self
    }

    /// Load tokenizer and weights. Blocks on downloads and disk IO.
    pub fn build(self) -> Result<BloomGenerator, CandleError> {
        let started = Instant::now();

        let (config, weights, bundled_tokenizer, description) = match &self.model_source {
            ModelSource::HuggingFace(checkpoint) => {
                let files = checkpoint.fetch(self.hf_token.clone())?;
                (
                    Config::from_file(&files.config)?,
                    files.weights,
                    Some(files.tokenizer),
                    format!("{}@{}", checkpoint.repo_id, checkpoint.revision),
                )
            }
            ModelSource::Files { config, weights } => {
                let sibling = config.with_file_name("tokenizer.json");
                (
                    Config::from_file(config)?,
                    weights.clone(),
                    sibling.exists().then_some(sibling),
                    config.display().to_string(),
                )
            }
            ModelSource::Config(config) => {
                (config.clone(), Vec::new(), None, "zero weights".to_string())
            }
        };

        let tokenizer = self.load_tokenizer(bundled_tokenizer)?;
        let model = self.load_model(&config, &weights)?;

        // Prefer the tokenizer's own end marker if the config disagrees.
        let eos = tokenizer.token_to_id(EOS_TOKEN).unwrap_or(config.eos_token_id);
        let special = SpecialTokens {
            bos: config.bos_token_id,
            eos,
        };

        tracing::info!(
            model = %description,
            layers = config.n_layer,
            hidden = config.hidden_size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "BLOOM generator ready"
        );

        let engine = SamplingEngine::new(model, tokenizer, self.device.clone(), special);
        Ok(CandleGenerator::from_engine(self.name, engine).with_description(description))
    }

    fn load_tokenizer(&self, bundled: Option<PathBuf>) -> Result<Tokenizer, CandleError> {
        match &self.tokenizer_source {
            TokenizerSource::File(path) => {
                tracing::debug!("loading tokenizer from {:?}", path);
                Ok(Tokenizer::from_file(path)?)
            }
            TokenizerSource::Instance(tokenizer) => Ok(tokenizer.clone()),
            TokenizerSource::Default => {
                let path = bundled.ok_or_else(|| {
                    CandleError::Other("no tokenizer.json available for this model".to_string())
                })?;
                tracing::debug!("loading tokenizer from {:?}", path);
                Ok(Tokenizer::from_file(path)?)
            }
        }
    }

    fn load_model(&self, config: &Config, weights: &[PathBuf]) -> Result<Bloom, CandleError> {
        let vb = if weights.is_empty() {
            VarBuilder::zeros(self.dtype, &self.device)
        } else {
            let mut tensors = HashMap::new();
            for path in weights {
                tracing::debug!("loading weights from {:?}", path);
                tensors.extend(candle_core::safetensors::load(path, &self.device)?);
            }
            VarBuilder::from_tensors(tensors, self.dtype, &self.device)
        };
        Bloom::load(vb, config)
    }
}

/// Generator running a [`CausalLm`] through the sampling engine
pub struct CandleGenerator<M: CausalLm> {
    engine: Arc<SamplingEngine<M>>,
    name: String,
    description: Option<String>,
}

/// The pretrained BLOOM generator
pub type BloomGenerator = CandleGenerator<Bloom>;

impl BloomGenerator {
    pub fn builder() -> BloomGeneratorBuilder {
        BloomGeneratorBuilder::new()
    }
}

impl<M: CausalLm> CandleGenerator<M> {
    pub fn from_engine(name: impl Into<String>, engine: SamplingEngine<M>) -> Self {
        Self {
            engine: Arc::new(engine),
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[async_trait]
impl<M: CausalLm + 'static> Generator for CandleGenerator<M> {
    async fn generate(&self, request: GenerationRequest) -> CoreResult<CompletionSet> {
        request.params.validate()?;

        let GenerationRequest {
            id,
            prompt,
            params,
            cancel,
        } = request;
        tracing::info!(request_id = %id, prompt_chars = prompt.chars().count(), "generate");

        let started = Instant::now();
        let engine = Arc::clone(&self.engine);
        let completions =
            tokio::task::spawn_blocking(move || engine.generate(&prompt, &params, &cancel))
                .await
                .map_err(|e| CoreError::Generation(format!("generation task failed: {}", e)))??;

        tracing::info!(
            request_id = %id,
            completions = completions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generation finished"
        );
        Ok(CompletionSet::new(id, completions))
    }

    fn metadata(&self) -> GeneratorMetadata {
        GeneratorMetadata {
            name: Some(self.name.clone()),
            description: self.description.clone(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
            capabilities: vec![
                "text-generation".to_string(),
                "top-k-sampling".to_string(),
            ],
        }
    }
}
