//! bloomgen: sample text from BLOOM in a window or on the terminal

use bloomgen_cli::{GenerationArgs, commands, error::CliError, gui, load_config};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bloomgen")]
#[command(author, version, about = "Text generation with BLOOM", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, global = true, env = "BLOOMGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, global = true, env = "BLOOMGEN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Use the echo generator instead of loading model weights
    #[arg(long, global = true)]
    echo: bool,

    #[command(flatten)]
    generation: GenerationArgs,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Open the generator window (default)
    Gui,
    /// Generate completions for one prompt and print them
    Generate {
        /// Initial text
        #[arg(long, short)]
        prompt: String,
    },
    /// Interactive prompt loop; type 'salir' to quit
    Chat,
    /// Download the configured checkpoint into the local cache
    Setup,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    cli.generation.apply(&mut config.generation);
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    let level = &config.log_level;
    let filter = format!("bloomgen={level},bloomgen_candle={level},bloomgen_cli={level}");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config
        .generation
        .validate()
        .map_err(|e| CliError::InvalidInput(e.to_string()))?;

    // eframe owns the main thread, so the runtime is built by hand rather
    // than through #[tokio::main].
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command.unwrap_or(Commands::Gui) {
        Commands::Gui => {
            let app = runtime.block_on(commands::load_app(&config, cli.echo))?;
            gui::run(app, runtime.handle().clone())?;
        }
        Commands::Generate { prompt } => {
            runtime.block_on(async {
                let app = commands::load_app(&config, cli.echo).await?;
                commands::run_generate(&app, prompt).await
            })?;
        }
        Commands::Chat => {
            runtime.block_on(async {
                let app = commands::load_app(&config, cli.echo).await?;
                commands::run_chat(app).await
            })?;
        }
        Commands::Setup => {
            runtime.block_on(commands::run_setup(&config.checkpoint))?;
        }
    }

    Ok(())
}
