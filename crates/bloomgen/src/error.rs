//! Error types for bloomgen crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BloomgenError {
    #[error("Core error: {0}")]
    Core(#[from] bloomgen_core::CoreError),

    #[error("Build error: {0}")]
    Build(String),

    #[cfg(feature = "candle")]
    #[error("Candle error: {0}")]
    Candle(#[from] bloomgen_candle::CandleError),
}

pub type Result<T> = std::result::Result<T, BloomgenError>;
