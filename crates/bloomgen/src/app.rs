//! Application layer for bloomgen
//!
//! [`BloomgenApp`] is the context object handed to every front-end: it owns
//! the generator loaded at startup and the default parameters every prompt
//! is sampled under.

use bloomgen_core::{
    CompletionSet, GenerationParams, GenerationRequest, Generator, Result as CoreResult,
    SharedGenerator,
};
use std::sync::Arc;

use crate::error::{BloomgenError, Result};

/// The main bloomgen application
#[derive(Clone)]
pub struct BloomgenApp {
    generator: SharedGenerator,
    defaults: GenerationParams,
    metadata: AppMetadata,
}

/// Metadata about the bloomgen application
#[derive(Debug, Clone)]
pub struct AppMetadata {
    pub name: String,
    pub version: String,
    /// Name reported by the generator
    pub generator: Option<String>,
}

impl BloomgenApp {
    /// Create a new builder
    pub fn builder(name: impl Into<String>) -> BloomgenAppBuilder {
        BloomgenAppBuilder::new(name)
    }

    /// Request for `prompt` under the default parameters
    pub fn request(&self, prompt: impl Into<String>) -> GenerationRequest {
        GenerationRequest::with_params(prompt, self.defaults.clone())
    }

    /// Generate completions for `prompt` under the default parameters
    pub async fn generate(&self, prompt: impl Into<String>) -> CoreResult<CompletionSet> {
        self.submit(self.request(prompt)).await
    }

    /// Run a prepared request
    pub async fn submit(&self, request: GenerationRequest) -> CoreResult<CompletionSet> {
        self.generator.generate(request).await
    }

    pub fn defaults(&self) -> &GenerationParams {
        &self.defaults
    }

    /// Get app metadata
    pub fn metadata(&self) -> &AppMetadata {
        &self.metadata
    }
}

#[cfg(feature = "candle")]
impl BloomgenApp {
    /// Load the configured checkpoint and wrap it in an app.
    ///
    /// Blocks on downloads and weight loading.
    pub fn load(name: impl Into<String>, config: &crate::BloomgenConfig) -> Result<Self> {
        let checkpoint = &config.checkpoint;
        let mut builder = bloomgen_candle::BloomGenerator::builder()
            .with_hf_token(checkpoint.hf_token.clone());

        builder = match &checkpoint.config_file {
            Some(config_file) => {
                builder.with_model_files(config_file, checkpoint.weight_files.iter())
            }
            None => builder.with_checkpoint(&checkpoint.repo_id, &checkpoint.revision),
        };
        if let Some(tokenizer) = &checkpoint.tokenizer_file {
            builder = builder.with_tokenizer_file(tokenizer);
        }

        let generator = builder.build()?;
        Self::builder(name)
            .params(config.generation.clone())
            .generator(generator)
            .build()
    }
}

/// Builder for creating bloomgen applications
pub struct BloomgenAppBuilder {
    name: String,
    version: String,
    defaults: GenerationParams,
    generator: Option<SharedGenerator>,
}

impl BloomgenAppBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            defaults: GenerationParams::default(),
            generator: None,
        }
    }

    /// Set the version
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the default generation parameters
    pub fn params(mut self, params: GenerationParams) -> Self {
        self.defaults = params;
        self
    }

    /// Set the generator
    pub fn generator(mut self, generator: impl Generator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Build the application
    pub fn build(self) -> Result<BloomgenApp> {
        let generator = self
            .generator
            .ok_or_else(|| BloomgenError::Build("No generator configured".to_string()))?;
        self.defaults
            .validate()
            .map_err(|e| BloomgenError::Build(e.to_string()))?;

        let metadata = AppMetadata {
            name: self.name,
            version: self.version,
            generator: generator.metadata().name,
        };

        Ok(BloomgenApp {
            generator,
            defaults: self.defaults,
            metadata,
        })
    }
}

/// Generators that need no model weights
pub mod generators {
    use async_trait::async_trait;
    use bloomgen_core::{
        CompletionSet, GenerationRequest, Generator, GeneratorMetadata, Result as CoreResult,
    };

    /// Returns the prompt once per requested sequence
    pub struct EchoGenerator;

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn generate(&self, request: GenerationRequest) -> CoreResult<CompletionSet> {
            request.params.validate()?;
            let completions = vec![request.prompt; request.params.num_return_sequences];
            Ok(CompletionSet::new(request.id, completions))
        }

        fn metadata(&self) -> GeneratorMetadata {
            GeneratorMetadata {
                name: Some("echo".to_string()),
                description: Some("Repeats the prompt".to_string()),
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generators::EchoGenerator;

    #[tokio::test]
    async fn test_app_builder() {
        let app = BloomgenApp::builder("test-app")
            .version("1.0.0")
            .params(GenerationParams::default().with_num_return_sequences(2))
            .generator(EchoGenerator)
            .build()
            .unwrap();

        assert_eq!(app.metadata().name, "test-app");
        assert_eq!(app.metadata().generator.as_deref(), Some("echo"));

        let set = app.generate("Hola").await.unwrap();
        assert_eq!(set.completions, vec!["Hola", "Hola"]);
    }

    #[test]
    fn test_build_requires_generator() {
        let result = BloomgenApp::builder("empty").build();
        assert!(matches!(result, Err(BloomgenError::Build(_))));
    }

    #[test]
    fn test_build_rejects_invalid_defaults() {
        let result = BloomgenApp::builder("bad")
            .params(GenerationParams::default().with_max_length(0))
            .generator(EchoGenerator)
            .build();
        assert!(matches!(result, Err(BloomgenError::Build(_))));
    }

    #[test]
    fn test_request_uses_defaults() {
        let params = GenerationParams::default().with_seed(Some(3));
        let app = BloomgenApp::builder("seeded")
            .params(params.clone())
            .generator(EchoGenerator)
            .build()
            .unwrap();

        let request = app.request("texto");
        assert_eq!(request.prompt, "texto");
        assert_eq!(request.params, params);
    }
}
