//! One-shot generation

use crate::error::CliError;
use bloomgen::BloomgenApp;
use bloomgen::session::render_completions;

pub async fn run_generate(app: &BloomgenApp, prompt: String) -> Result<(), CliError> {
    let set = app.generate(prompt).await?;
    print!("{}", render_completions(&set));
    Ok(())
}
