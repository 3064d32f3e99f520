//! Error types for bloomgen-candle

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CandleError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] tokenizers::Error),

    #[error("Hub error: {0}")]
    Hub(#[from] hf_hub::api::sync::ApiError),

    #[error("Invalid model config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

// Convert CandleError to CoreError
impl From<CandleError> for bloomgen_core::CoreError {
    fn from(err: CandleError) -> Self {
        bloomgen_core::CoreError::Backend(err.to_string())
    }
}
