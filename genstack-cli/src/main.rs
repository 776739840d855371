use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use genstack_cli::commands::{api, config_cmd, demo, image_gen, infer, model};
use genstack_cli::config::StackConfig;

#[derive(Debug, Parser)]
#[command(
    name = "genstack",
    version,
    about = "Bootstrap CLI for the genstack local GenAI serving stack"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Bring the API server and its containers up
    Api {
        /// Also discard persisted volumes during teardown
        #[arg(long)]
        hard: bool,
    },
    /// Download models, bootstrap image generation, then start the API
    Demo(demo::DemoArgs),
    /// Download and inspect model artifacts
    Model {
        #[command(subcommand)]
        command: model::ModelCommands,
    },
    /// Bootstrap Python and run the image generation API
    ImageGen,
    /// Run the minimal chat interface
    Infer {
        #[command(subcommand)]
        command: infer::InferCommands,
    },
    /// Inspect or persist configuration
    Config {
        #[command(subcommand)]
        command: config_cmd::ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = StackConfig::load()?;

    // One token shared by every flow; Ctrl+C requests cooperative
    // shutdown of the current child or transfer.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Api { hard } => api::handle_api_command(&config, hard, &cancel).await,
        Commands::Demo(args) => demo::handle_demo_command(&config, args, &cancel).await,
        Commands::Model { command } => {
            model::handle_model_command(&config, command, &cancel).await
        }
        Commands::ImageGen => image_gen::handle_image_gen_command(&config, &cancel).await,
        Commands::Infer { command } => {
            infer::handle_infer_command(&config, command, &cancel).await
        }
        Commands::Config { command } => config_cmd::handle_config_command(&config, command),
    }
}
