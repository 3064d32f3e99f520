//! Setup command handler

use crate::error::CliError;
use bloomgen::{CheckpointConfig, Checkpoint};

/// Pre-download config, tokenizer and weights so the window opens offline
pub async fn run_setup(checkpoint: &CheckpointConfig) -> Result<(), CliError> {
    if let Some(config_file) = &checkpoint.config_file {
        println!(
            "📄 Using local model files ({}), nothing to download",
            config_file.display()
        );
        return Ok(());
    }

    let target = Checkpoint::new(&checkpoint.repo_id, &checkpoint.revision);
    let token = checkpoint.hf_token.clone();
    println!("📦 Fetching {}@{} ...", target.repo_id, target.revision);

    let files = tokio::task::spawn_blocking(move || target.fetch(token)).await??;

    println!("✅ Checkpoint cached");
    println!("   config:    {}", files.config.display());
    println!("   tokenizer: {}", files.tokenizer.display());
    for shard in &files.weights {
        println!("   weights:   {}", shard.display());
    }
    Ok(())
}
