//! Error types for bloomgen-cli

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generation error: {0}")]
    Core(#[from] bloomgen::CoreError),

    #[error("Application error: {0}")]
    App(#[from] bloomgen::BloomgenError),

    #[error("Model error: {0}")]
    Candle(#[from] bloomgen_candle::CandleError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Window error: {0}")]
    Gui(String),
}
