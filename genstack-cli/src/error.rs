//! Error taxonomy for the bootstrap flows.
//!
//! Probe and install failures surface as values the caller must check;
//! orchestration-step failures are reduced to per-step outcomes instead
//! (see `orchestrate::report`).

use std::path::PathBuf;

use snafu::Snafu;

/// Failures of a single subprocess invocation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CommandError {
    #[snafu(display("failed to spawn {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to wait for {program}: {source}"))]
    Wait {
        program: String,
        source: std::io::Error,
    },

    /// The operator interrupted the run; the child was force-terminated.
    #[snafu(display("{program} was cancelled"))]
    Cancelled { program: String },
}

/// Failures while resolving or installing the Python interpreter.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum InterpreterError {
    #[snafu(display(
        "no supported package manager found; please install Python 3.9+ manually"
    ))]
    ManualInstallRequired,

    #[snafu(display(
        "installation finished but no compatible Python 3.9+ was found; please install it manually"
    ))]
    IncompatibleAfterInstall,

    #[snafu(display("could not determine the local application data directory"))]
    NoInstallDir,

    #[snafu(display("failed to download the Python installer: {source}"))]
    InstallerFetch { source: DownloadError },

    #[snafu(display("`{step}` failed with exit code {code}"))]
    InstallStep { step: String, code: i32 },

    #[snafu(display("{source}"))]
    Runner { source: CommandError },
}

/// Failures of a single artifact download.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DownloadError {
    #[snafu(display("model name must not be empty"))]
    InvalidName,

    #[snafu(display("models map file not found at {}", path.display()))]
    ManifestMissing { path: PathBuf },

    #[snafu(display("failed to read models map at {}: {source}", path.display()))]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("model '{name}' not found in models map"))]
    UnknownArtifact { name: String },

    #[snafu(display("failed to build the HTTP client: {source}"))]
    Client { source: reqwest::Error },

    #[snafu(display("request for {url} failed: {source}"))]
    Transport { url: String, source: reqwest::Error },

    #[snafu(display("transfer from {url} was interrupted: {source}"))]
    Stream {
        url: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to write {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Cooperative cancellation between chunks; only the staging file is
    /// left behind.
    #[snafu(display("download of '{name}' was cancelled"))]
    Aborted { name: String },
}

/// Failures while loading or persisting configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display(
        "models path is not configured; run `genstack config set models-path <dir>` or set GENSTACK_MODELS_PATH"
    ))]
    ModelsPathUnset,

    #[snafu(display("could not determine the user configuration directory"))]
    NoConfigDir,

    #[snafu(display("failed to read config at {}: {source}", path.display()))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse config at {}: {source}", path.display()))]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("failed to serialize config: {source}"))]
    Serialize { source: toml::ser::Error },

    #[snafu(display("failed to write config at {}: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
