//! The `genstack config` subcommand: persist and inspect configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};

use crate::config::{PersistedConfig, StackConfig};

#[derive(Debug, Subcommand, Clone)]
pub enum ConfigCommands {
    /// Persist a configuration value
    Set {
        #[arg(value_enum)]
        key: ConfigKey,
        value: String,
    },
    /// Print the resolved configuration
    Show,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigKey {
    /// Local directory where model artifacts are stored
    ModelsPath,
    /// OpenAI API credential
    OpenaiKey,
    /// Gemini API credential
    GeminiKey,
}

pub fn handle_config_command(config: &StackConfig, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => set_value(key, value),
        ConfigCommands::Show => {
            show(config);
            Ok(())
        }
    }
}

fn set_value(key: ConfigKey, value: String) -> Result<()> {
    let path = PersistedConfig::default_path()?;
    let mut persisted = PersistedConfig::load(&path)?;

    match key {
        ConfigKey::ModelsPath => {
            let dir = PathBuf::from(shellexpand::tilde(&value).as_ref());
            if !dir.exists() {
                println!("The provided path does not exist. Creating the directory...");
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            persisted.models_path = Some(dir.display().to_string());
            println!("Models path set to: {}", dir.display());
        }
        ConfigKey::OpenaiKey => {
            persisted.openai_api_key = Some(value);
            println!("OpenAI API key set successfully");
        }
        ConfigKey::GeminiKey => {
            persisted.gemini_api_key = Some(value);
            println!("Gemini API key set successfully");
        }
    }

    persisted.store(&path)?;
    println!("Configuration written to {}", path.display());
    Ok(())
}

fn show(config: &StackConfig) {
    let models = config
        .models_dir
        .as_ref()
        .map_or_else(|| "(unset)".to_string(), |dir| dir.display().to_string());
    println!("models path:     {models}");
    println!("models map:      {}", config.manifest_path.display());
    println!("stack root:      {}", config.stack_root.display());
    println!("compose binary:  {}", config.compose_bin);
    println!("openai api key:  {}", mask(config.openai_api_key.as_deref()));
    println!("gemini api key:  {}", mask(config.gemini_api_key.as_deref()));
}

/// Secrets are never echoed back.
fn mask(secret: Option<&str>) -> &'static str {
    if secret.is_some() { "configured" } else { "(unset)" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask(Some("sk-verysecret")), "configured");
        assert_eq!(mask(None), "(unset)");
    }
}
