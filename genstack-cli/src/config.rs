//! Resolved configuration for the stack tools.
//!
//! Everything the components need (paths, binaries, version floors, grace
//! intervals) is resolved once in `main` and passed in by reference; no
//! component reads environment variables or mutates the working directory
//! after this point.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::deps::VersionRequirement;
use crate::error::{ConfigError, ParseSnafu, ReadSnafu, SerializeSnafu, WriteSnafu};

/// Port the long-lived server binds once it is up.
pub const API_PORT: u16 = 5001;

/// Port the chat interface binds.
pub const INFER_PORT: u16 = 5555;

/// File extension of downloaded model artifacts.
pub const MODEL_EXTENSION: &str = "gguf";

/// Flat-file manifest mapping model names to source URLs.
pub const MANIFEST_FILE: &str = "models_map.txt";

/// Directory (relative to the stack root) holding the server executable.
pub const SERVER_DIR: &str = "server";

/// Directory (relative to the stack root) holding the image-gen API.
pub const IMAGE_GEN_DIR: &str = "imagegen";

/// Directory (relative to the stack root) holding the chat interface.
pub const INFER_DIR: &str = "infer";

const SERVER_EXE: &str = if cfg!(windows) {
    "genstack-server.exe"
} else {
    "genstack-server"
};

/// Seconds to wait after teardown and after the server launch so resources
/// release and the port binds before dependent containers come up.
pub const DEFAULT_GRACE_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }
}

/// Values persisted by `genstack config set`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PersistedConfig {
    pub models_path: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl PersistedConfig {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("genstack").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Missing file is not an error; it simply means nothing was persisted.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).context(ReadSnafu { path })?;
        toml::from_str(&text).context(ParseSnafu { path })
    }

    pub fn store(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(WriteSnafu { path: parent })?;
        }
        let text = toml::to_string_pretty(self).context(SerializeSnafu)?;
        std::fs::write(path, text).context(WriteSnafu { path })
    }
}

/// Resolved configuration handed to every component at construction.
#[derive(Debug, Clone)]
pub struct StackConfig {
    pub platform: Platform,
    /// Compose project root; also where the manifest and server live.
    pub stack_root: PathBuf,
    pub models_dir: Option<PathBuf>,
    pub manifest_path: PathBuf,
    pub server_exe: PathBuf,
    pub compose_bin: String,
    pub runtime_bin: String,
    pub grace_period: Duration,
    pub runtime_floor: VersionRequirement,
    pub interpreter_floor: VersionRequirement,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl StackConfig {
    /// Built-in defaults rooted at `stack_root`; no file or environment
    /// access.
    pub fn with_root(stack_root: PathBuf) -> Self {
        let manifest_path = stack_root.join(MANIFEST_FILE);
        let server_exe = stack_root.join(SERVER_DIR).join(SERVER_EXE);
        Self {
            platform: Platform::current(),
            stack_root,
            models_dir: None,
            manifest_path,
            server_exe,
            compose_bin: "docker-compose".to_string(),
            runtime_bin: "dotnet".to_string(),
            grace_period: Duration::from_secs(DEFAULT_GRACE_SECS),
            runtime_floor: VersionRequirement::major_floor(8),
            interpreter_floor: VersionRequirement::exact_major(3, 9),
            openai_api_key: None,
            gemini_api_key: None,
        }
    }

    /// Merge defaults, the persisted config file, then environment
    /// overrides (`GENSTACK_MODELS_PATH`, `GENSTACK_MANIFEST`,
    /// `OPENAI_API_KEY`, `GEMINI_API_KEY`).
    pub fn load() -> Result<Self, ConfigError> {
        let persisted = PersistedConfig::load(&PersistedConfig::default_path()?)?;
        let mut config = Self::with_root(default_stack_root());

        config.models_dir = env_path("GENSTACK_MODELS_PATH")
            .or_else(|| persisted.models_path.as_deref().map(expand_path));
        if let Some(manifest) = env_path("GENSTACK_MANIFEST") {
            config.manifest_path = manifest;
        }
        config.openai_api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .or(persisted.openai_api_key);
        config.gemini_api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .or(persisted.gemini_api_key);

        Ok(config)
    }

    /// The models directory is a hard precondition for download and
    /// list-present operations.
    pub fn require_models_dir(&self) -> Result<&Path, ConfigError> {
        self.models_dir
            .as_deref()
            .ok_or(ConfigError::ModelsPathUnset)
    }

    pub fn image_gen_dir(&self) -> PathBuf {
        self.stack_root.join(IMAGE_GEN_DIR)
    }

    pub fn infer_dir(&self) -> PathBuf {
        self.stack_root.join(INFER_DIR)
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    let value = std::env::var(key).ok()?;
    if value.trim().is_empty() {
        return None;
    }
    Some(expand_path(&value))
}

/// Expand `~` the same way the shell would.
fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

fn default_stack_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_root_derives_stack_paths() {
        let config = StackConfig::with_root(PathBuf::from("/opt/genstack"));
        assert_eq!(config.manifest_path, PathBuf::from("/opt/genstack/models_map.txt"));
        assert!(config.server_exe.starts_with("/opt/genstack/server"));
        assert_eq!(config.grace_period, Duration::from_secs(10));
    }

    #[test]
    fn expand_path_resolves_tilde() {
        let path = expand_path("~/models");
        assert!(!path.to_string_lossy().contains('~'));
        assert!(path.to_string_lossy().ends_with("models"));
    }

    #[test]
    fn expand_path_leaves_absolute_paths_alone() {
        assert_eq!(expand_path("/tmp/models"), PathBuf::from("/tmp/models"));
    }

    #[test]
    fn missing_models_dir_is_a_precondition_error() {
        let config = StackConfig::with_root(PathBuf::from("/opt/genstack"));
        let err = config.require_models_dir().unwrap_err();
        assert!(matches!(err, ConfigError::ModelsPathUnset));
    }

    #[test]
    fn persisted_config_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let persisted = PersistedConfig {
            models_path: Some("/data/models".to_string()),
            openai_api_key: Some("sk-test".to_string()),
            gemini_api_key: None,
        };
        persisted.store(&path).unwrap();

        let loaded = PersistedConfig::load(&path).unwrap();
        assert_eq!(loaded.models_path.as_deref(), Some("/data/models"));
        assert_eq!(loaded.openai_api_key.as_deref(), Some("sk-test"));
        assert!(loaded.gemini_api_key.is_none());
    }

    #[test]
    fn absent_persisted_config_defaults_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = PersistedConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert!(loaded.models_path.is_none());
    }
}
