//! The `genstack image-gen` subcommand: bootstrap Python and run the
//! image generation API.
//!
//! The API child is owned by this flow and terminated on every exit path;
//! nothing relies on drop order or finalizers to clean it up.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio_util::sync::CancellationToken;

use crate::config::StackConfig;
use crate::deps;
use crate::process::CommandRunner;

/// Ensure a compatible interpreter, verify it, and install the API's
/// requirements when present. Returns the interpreter path.
pub async fn bootstrap_image_gen(
    config: &StackConfig,
    runner: &CommandRunner,
) -> Result<PathBuf> {
    let python = deps::ensure_interpreter(config, runner).await?;
    deps::verify_interpreter(&python, runner).await?;
    deps::install_requirements(&python, runner, &config.image_gen_dir()).await?;
    Ok(python)
}

pub async fn handle_image_gen_command(
    config: &StackConfig,
    cancel: &CancellationToken,
) -> Result<()> {
    let runner = CommandRunner::new(config.stack_root.clone());
    let python = bootstrap_image_gen(config, &runner).await?;
    let script = entrypoint(config)?;

    println!("Starting Image Generation API...");
    let mut child = tokio::process::Command::new(&python)
        .arg(&script)
        .current_dir(&config.stack_root)
        .spawn()
        .with_context(|| format!("failed to start {}", script.display()))?;

    println!("Image Generation API is running. Press Ctrl+C to stop.");
    tokio::select! {
        status = child.wait() => {
            let status = status.context("failed to wait for the Image Generation API")?;
            println!("Image Generation API exited with {status}.");
        }
        () = cancel.cancelled() => {
            println!("Stopping Image Generation API...");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
    Ok(())
}

/// Launch the API detached for the demo flow; the demo hands ownership to
/// the operating system rather than holding the child.
pub fn spawn_background(config: &StackConfig, python: &Path) -> Result<()> {
    let script = entrypoint(config)?;
    CommandRunner::spawn_detached(python, &[script.as_os_str()], &config.stack_root)
        .with_context(|| format!("failed to start {}", script.display()))
}

fn entrypoint(config: &StackConfig) -> Result<PathBuf> {
    let script = config.image_gen_dir().join("main.py");
    if !script.exists() {
        bail!("image generation entrypoint not found at {}", script.display());
    }
    Ok(script)
}
