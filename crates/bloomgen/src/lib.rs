//! Application crate for bloomgen
//!
//! Wires a [`Generator`](bloomgen_core::Generator) into the context object
//! and presentation session the front-ends drive.

pub mod app;
pub mod config;
pub mod error;
pub mod session;

// Re-export core types
pub use bloomgen_core::{
    CancellationFlag, CompletionSet, CoreError, GenerationParams, GenerationRequest, Generator,
    GeneratorExt, GeneratorMetadata, RequestId, Result, SharedGenerator,
};

pub use app::{AppMetadata, BloomgenApp, BloomgenAppBuilder};
pub use config::{BloomgenConfig, CheckpointConfig};
pub use error::{BloomgenError, Result as BloomgenResult};
pub use session::{Session, SessionState, Submission};

// Feature-gated re-exports
#[cfg(feature = "candle")]
pub use bloomgen_candle::{BloomGenerator, BloomGeneratorBuilder, Checkpoint};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::app::BloomgenApp;
    pub use crate::session::{Session, SessionState, Submission};
    pub use bloomgen_core::{CompletionSet, GenerationParams, GenerationRequest, Generator};
}
