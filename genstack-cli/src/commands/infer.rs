//! The `genstack infer` subcommand: run the minimal chat interface.
//!
//! The chat child is held under an explicit handle and terminated on every
//! exit path, the same way the image generation flow owns its API process.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::{INFER_PORT, Platform, StackConfig};
use crate::deps;

#[derive(Debug, Subcommand, Clone)]
pub enum InferCommands {
    /// Start the chat interface and open it in the browser
    Chat {
        /// Arguments forwarded to the chat application
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

pub async fn handle_infer_command(
    config: &StackConfig,
    command: InferCommands,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        InferCommands::Chat { args } => chat(config, &args, cancel).await,
    }
}

async fn chat(config: &StackConfig, args: &[String], cancel: &CancellationToken) -> Result<()> {
    if !deps::ensure_runtime(config).await {
        bail!("required runtime missing; cannot start the chat interface");
    }

    let infer_dir = config.infer_dir();
    if !infer_dir.is_dir() {
        bail!("infer directory not found at {}", infer_dir.display());
    }

    let mut argv = infer_argv(&infer_dir);
    argv.extend(args.iter().cloned());
    println!(
        "Starting chat process: {} {}",
        config.runtime_bin,
        argv.join(" ")
    );

    let mut child = tokio::process::Command::new(&config.runtime_bin)
        .args(&argv)
        .current_dir(&infer_dir)
        .spawn()
        .with_context(|| format!("failed to start {}", config.runtime_bin))?;

    // Let the app bind its port before pointing a browser at it.
    tokio::select! {
        () = tokio::time::sleep(Duration::from_secs(2)) => {}
        () = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Ok(());
        }
    }

    let url = format!("http://localhost:{INFER_PORT}");
    println!("Opening browser at {url}...");
    if let Err(err) = open_browser(config.platform, &url) {
        warn!(%err, "could not open a browser");
    }

    tokio::select! {
        status = child.wait() => {
            let status = status.context("failed to wait for the chat process")?;
            println!("Chat process exited with {status}.");
        }
        () = cancel.cancelled() => {
            println!("Stopping chat process...");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
    Ok(())
}

/// Prefer a published dll when one is present; fall back to running from
/// the project sources.
fn infer_argv(infer_dir: &Path) -> Vec<String> {
    for dll in ["genstack-infer.dll", "genstack-infer-page.dll"] {
        if infer_dir.join(dll).exists() {
            return vec![dll.to_string()];
        }
    }
    vec!["run".to_string(), "--".to_string()]
}

fn open_browser(platform: Platform, url: &str) -> std::io::Result<()> {
    let (program, args): (&str, Vec<&str>) = match platform {
        Platform::Windows => ("cmd", vec!["/C", "start", "", url]),
        Platform::MacOs => ("open", vec![url]),
        Platform::Linux => ("xdg-open", vec![url]),
    };
    std::process::Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_running_from_sources() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(infer_argv(dir.path()), vec!["run", "--"]);
    }

    #[test]
    fn prefers_the_published_dll() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("genstack-infer.dll"), b"x").unwrap();
        assert_eq!(infer_argv(dir.path()), vec!["genstack-infer.dll"]);
    }
}
