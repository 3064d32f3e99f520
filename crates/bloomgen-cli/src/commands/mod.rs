pub mod chat;
pub mod generate;
pub mod setup;

pub use chat::run_chat;
pub use generate::run_generate;
pub use setup::run_setup;

use crate::{APP_NAME, error::CliError};
use bloomgen::app::generators::EchoGenerator;
use bloomgen::{BloomgenApp, BloomgenConfig};

/// Build the app every front-end shares.
///
/// With `echo` no weights are touched; otherwise the checkpoint is loaded on
/// a blocking thread.
pub async fn load_app(config: &BloomgenConfig, echo: bool) -> Result<BloomgenApp, CliError> {
    if echo {
        println!("🔁 Using echo generator (no model loaded)");
        return Ok(BloomgenApp::builder(APP_NAME)
            .params(config.generation.clone())
            .generator(EchoGenerator)
            .build()?);
    }

    println!(
        "🔥 Loading {}@{} ...",
        config.checkpoint.repo_id, config.checkpoint.revision
    );
    let config = config.clone();
    let app = tokio::task::spawn_blocking(move || BloomgenApp::load(APP_NAME, &config)).await??;
    println!("✅ Model ready");
    Ok(app)
}
