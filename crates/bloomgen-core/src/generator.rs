//! Generator trait for bloomgen-core
//!
//! A generator turns a prompt into a set of sampled completions. The
//! presentation layer only ever talks to this trait, so the pretrained model
//! can be swapped for a stub in tests or offline runs.

use crate::{CompletionSet, GenerationRequest, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait for text generation backends
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce exactly `request.params.num_return_sequences` completions
    async fn generate(&self, request: GenerationRequest) -> Result<CompletionSet>;

    /// Optional method to get generator metadata
    fn metadata(&self) -> GeneratorMetadata {
        GeneratorMetadata::default()
    }
}

/// Metadata about a generator
#[derive(Debug, Clone, Default)]
pub struct GeneratorMetadata {
    /// Human-readable name of the generator
    pub name: Option<String>,
    /// Checkpoint or backend description
    pub description: Option<String>,
    /// Version information
    pub version: Option<String>,
    pub capabilities: Vec<String>,
}

/// Arc-wrapped generator for thread-safe sharing
pub type SharedGenerator = Arc<dyn Generator>;

/// Extension trait for generator conversion
pub trait GeneratorExt: Generator {
    /// Convert to a shared generator
    fn shared(self) -> SharedGenerator
    where
        Self: Sized + 'static,
    {
        Arc::new(self)
    }
}

impl<T: Generator> GeneratorExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoreError, GenerationParams};

    /// Repeats the prompt once per requested sequence
    struct RepeatGenerator;

    #[async_trait]
    impl Generator for RepeatGenerator {
        async fn generate(&self, request: GenerationRequest) -> Result<CompletionSet> {
            request.params.validate()?;
            let completions = (0..request.params.num_return_sequences)
                .map(|i| format!("{} #{}", request.prompt, i))
                .collect();
            Ok(CompletionSet::new(request.id, completions))
        }
    }

    #[tokio::test]
    async fn test_basic_generator() {
        let generator = RepeatGenerator.shared();
        let params = GenerationParams::default().with_num_return_sequences(3);
        let request = GenerationRequest::with_params("hola", params);
        let id = request.id.clone();

        let set = generator.generate(request).await.unwrap();
        assert_eq!(set.request_id, id);
        assert_eq!(set.completions, vec!["hola #0", "hola #1", "hola #2"]);
    }

    #[tokio::test]
    async fn test_invalid_params_propagate() {
        let params = GenerationParams::default().with_num_return_sequences(0);
        let request = GenerationRequest::with_params("hola", params);

        let err = RepeatGenerator.generate(request).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidRequest(_)));
    }
}
