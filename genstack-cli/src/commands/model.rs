//! The `genstack model` subcommand: download and inspect model artifacts.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use tokio_util::sync::CancellationToken;

use crate::config::{MODEL_EXTENSION, StackConfig};
use crate::download::{DownloadStatus, ModelDownloader};
use crate::manifest::Manifest;

#[derive(Debug, Subcommand, Clone)]
pub enum ModelCommands {
    /// Download a model listed in the models map
    Download {
        /// Model name as it appears in the models map
        name: String,
    },
    /// List models available in the models map
    List,
    /// List models already present on disk
    Present,
}

pub async fn handle_model_command(
    config: &StackConfig,
    command: ModelCommands,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        ModelCommands::Download { name } => {
            let models_dir = config.require_models_dir()?;
            let downloader = ModelDownloader::new(&config.manifest_path, models_dir)?;
            match downloader.download(&name, cancel).await? {
                DownloadStatus::AlreadyPresent(_) => {}
                DownloadStatus::Completed { path, bytes } => {
                    println!("Saved {bytes} bytes to {}", path.display());
                }
            }
        }
        ModelCommands::List => {
            let manifest = Manifest::load(&config.manifest_path)?;
            println!("Available models:");
            for name in manifest.names() {
                println!("- {name}");
            }
        }
        ModelCommands::Present => {
            let models_dir = config.require_models_dir()?;
            list_present(models_dir)?;
        }
    }
    Ok(())
}

fn list_present(models_dir: &Path) -> Result<()> {
    println!("Downloaded models:");
    println!("Models path: {}", models_dir.display());

    if !models_dir.is_dir() {
        println!("Models directory {} not found", models_dir.display());
        return Ok(());
    }

    let mut present = Vec::new();
    let entries = std::fs::read_dir(models_dir)
        .with_context(|| format!("failed to read {}", models_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == MODEL_EXTENSION) {
            if let Some(stem) = path.file_stem() {
                present.push(stem.to_string_lossy().into_owned());
            }
        }
    }

    if present.is_empty() {
        println!("No models found in {}", models_dir.display());
    } else {
        present.sort_unstable();
        for model in present {
            println!("- {model}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_present_ignores_non_model_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gemma2-2b.gguf"), b"x").unwrap();
        std::fs::write(dir.path().join("qwen2.5-0.5b.gguf"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("partial.gguf.part"), b"x").unwrap();

        // Smoke: must not error; filtering is visible through read_dir.
        list_present(dir.path()).unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| {
                let path = entry.unwrap().path();
                path.extension()
                    .is_some_and(|ext| ext == MODEL_EXTENSION)
                    .then(|| path.file_stem().unwrap().to_string_lossy().into_owned())
            })
            .collect();
        names.sort_unstable();
        assert_eq!(names, vec!["gemma2-2b", "qwen2.5-0.5b"]);
    }
}
