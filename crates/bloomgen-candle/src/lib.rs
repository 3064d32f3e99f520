//! Candle backend for bloomgen
//!
//! Loads a BLOOM checkpoint with its tokenizer and samples completions from it.

pub mod bloom;
pub mod error;
mod generator;
pub mod hub;
pub mod sampling;

pub use bloom::{Bloom, Config as BloomConfig};
pub use error::CandleError;
pub use generator::{
    BloomGenerator, BloomGeneratorBuilder, CandleGenerator, ModelSource, TokenizerSource,
};
pub use hub::{Checkpoint, CheckpointFiles};
pub use sampling::{CausalLm, SamplingEngine, SpecialTokens};
