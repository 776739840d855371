//! The `genstack demo` subcommand: models, image generation, then the API.

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use super::{api, image_gen, model};
use crate::config::StackConfig;
use crate::process::CommandRunner;

#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Also discard persisted volumes during teardown
    #[arg(long)]
    pub hard: bool,

    /// Model to download before bringing the stack up (repeatable)
    #[arg(long = "model")]
    pub models: Vec<String>,

    /// Skip starting the API server and containers
    #[arg(long)]
    pub no_api: bool,

    /// Only start the API; skip models and image generation
    #[arg(long)]
    pub api_only: bool,

    /// Skip the image generation bootstrap
    #[arg(long)]
    pub no_image_gen: bool,

    /// Skip model downloads
    #[arg(long)]
    pub no_models: bool,
}

pub async fn handle_demo_command(
    config: &StackConfig,
    args: DemoArgs,
    cancel: &CancellationToken,
) -> Result<()> {
    if !args.api_only {
        if !args.no_models && !args.models.is_empty() {
            println!("Starting model downloads...");
            for name in &args.models {
                // One bad model must not sink the rest of the demo.
                let command = model::ModelCommands::Download { name: name.clone() };
                if let Err(err) = model::handle_model_command(config, command, cancel).await {
                    eprintln!("Error downloading model '{name}': {err}");
                }
            }
        }

        if !args.no_image_gen {
            println!("Starting Image Generation API as a background job...");
            let runner = CommandRunner::new(config.stack_root.clone());
            let python = image_gen::bootstrap_image_gen(config, &runner).await?;
            image_gen::spawn_background(config, &python)?;
        }
    }

    if !args.no_api {
        println!("Starting main API...");
        api::handle_api_command(config, args.hard, cancel).await?;
    }

    Ok(())
}
