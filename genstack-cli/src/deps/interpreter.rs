//! Python interpreter bootstrap.
//!
//! Windows installs a pinned build into the user's local application data;
//! Linux and macOS go through whichever supported package manager is on
//! the search path. The install table is data, not control flow.

use std::path::{Path, PathBuf};
use std::time::Duration;

use snafu::{OptionExt, ResultExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DependencyProbe, extract_version};
use crate::config::{Platform, StackConfig};
use crate::download;
use crate::error::{
    ClientSnafu, IncompatibleAfterInstallSnafu, InstallStepSnafu, InstallerFetchSnafu,
    InterpreterError, ManualInstallRequiredSnafu, NoInstallDirSnafu, RunnerSnafu,
};
use crate::process::CommandRunner;

/// Pinned version used for the unattended Windows install.
pub const PYTHON_PIN: &str = "3.9.13";

/// Ordered install table for one platform; the first manager present on
/// the search path is used and the rest are never tried.
#[derive(Debug)]
pub struct PackageManager {
    pub bin: &'static str,
    pub commands: &'static [&'static [&'static str]],
    pub needs_sudo: bool,
}

const LINUX_PACKAGE_MANAGERS: &[PackageManager] = &[
    PackageManager {
        bin: "apt-get",
        commands: &[
            &["update"],
            &["install", "-y", "python3", "python3-pip", "python3-venv"],
        ],
        needs_sudo: true,
    },
    PackageManager {
        bin: "yum",
        commands: &[&["install", "-y", "python3", "python3-pip"]],
        needs_sudo: true,
    },
    PackageManager {
        bin: "dnf",
        commands: &[&["install", "-y", "python3", "python3-pip"]],
        needs_sudo: true,
    },
    PackageManager {
        bin: "pacman",
        commands: &[&["-S", "--noconfirm", "python", "python-pip"]],
        needs_sudo: true,
    },
    PackageManager {
        bin: "zypper",
        commands: &[&["install", "-y", "python3", "python3-pip"]],
        needs_sudo: true,
    },
];

const MACOS_PACKAGE_MANAGERS: &[PackageManager] = &[PackageManager {
    bin: "brew",
    commands: &[&["install", "python@3.9"]],
    needs_sudo: false,
}];

pub fn package_managers(platform: Platform) -> &'static [PackageManager] {
    match platform {
        Platform::Linux => LINUX_PACKAGE_MANAGERS,
        Platform::MacOs => MACOS_PACKAGE_MANAGERS,
        Platform::Windows => &[],
    }
}

/// Resolve a compatible interpreter, installing one if platform policy
/// allows. Fatal on failure; callers must not continue without it.
pub async fn ensure_interpreter(
    config: &StackConfig,
    runner: &CommandRunner,
) -> Result<PathBuf, InterpreterError> {
    match config.platform {
        Platform::Windows => ensure_windows(runner).await,
        Platform::Linux | Platform::MacOs => ensure_unix(config, runner).await,
    }
}

async fn ensure_unix(
    config: &StackConfig,
    runner: &CommandRunner,
) -> Result<PathBuf, InterpreterError> {
    if let Some(python) = find_compatible(config).await {
        println!("Compatible Python found at {}", python.display());
        return Ok(python);
    }

    let mut chosen = None;
    for manager in package_managers(config.platform) {
        if find_executable(manager.bin).await.is_some() {
            chosen = Some(manager);
            break;
        }
    }
    let Some(manager) = chosen else {
        return ManualInstallRequiredSnafu.fail();
    };

    println!("Installing Python 3.9+ using {}...", manager.bin);
    for command in manager.commands {
        let mut argv: Vec<&str> = Vec::new();
        let program = if manager.needs_sudo {
            argv.push(manager.bin);
            "sudo"
        } else {
            manager.bin
        };
        argv.extend_from_slice(command);

        let code = runner.run(program, &argv).await.context(RunnerSnafu)?;
        if code != 0 {
            return InstallStepSnafu {
                step: format!("{program} {}", argv.join(" ")),
                code,
            }
            .fail();
        }
    }

    match find_compatible(config).await {
        Some(python) => Ok(python),
        None => IncompatibleAfterInstallSnafu.fail(),
    }
}

/// Presence of the pinned install is treated as sufficient on Windows; the
/// install directory is versioned, so no version probe runs here.
async fn ensure_windows(runner: &CommandRunner) -> Result<PathBuf, InterpreterError> {
    let install_dir = dirs::data_local_dir()
        .map(|dir| dir.join("Programs").join("Python").join("Python39"))
        .context(NoInstallDirSnafu)?;
    let python_exe = install_dir.join("python.exe");

    if python_exe.exists() {
        println!(
            "Python {PYTHON_PIN} is already installed at {}.",
            install_dir.display()
        );
        return Ok(python_exe);
    }

    install_windows(runner).await?;
    prepend_process_path(&install_dir);

    if python_exe.exists() {
        Ok(python_exe)
    } else {
        IncompatibleAfterInstallSnafu.fail()
    }
}

async fn install_windows(runner: &CommandRunner) -> Result<(), InterpreterError> {
    let url =
        format!("https://www.python.org/ftp/python/{PYTHON_PIN}/python-{PYTHON_PIN}-amd64.exe");
    let installer = std::env::temp_dir().join(format!("python-{PYTHON_PIN}-installer.exe"));

    println!("Downloading Python {PYTHON_PIN}...");
    let client = reqwest::Client::builder()
        .build()
        .context(ClientSnafu)
        .context(InstallerFetchSnafu)?;
    download::fetch_to_file(&client, &url, &installer, &CancellationToken::new())
        .await
        .context(InstallerFetchSnafu)?;

    println!("Installing Python {PYTHON_PIN}...");
    let installer_cmd = installer.to_string_lossy();
    let code = runner
        .run(
            &installer_cmd,
            &["/quiet", "InstallAllUsers=0", "PrependPath=1", "Include_pip=1"],
        )
        .await
        .context(RunnerSnafu)?;
    let _ = std::fs::remove_file(&installer);
    if code != 0 {
        return InstallStepSnafu {
            step: format!("{installer_cmd} /quiet"),
            code,
        }
        .fail();
    }

    // The installer keeps copying files briefly after the process exits.
    tokio::time::sleep(Duration::from_secs(10)).await;
    Ok(())
}

/// Child processes spawned later must see the new install directory.
fn prepend_process_path(dir: &Path) {
    let current = std::env::var_os("PATH").unwrap_or_default();
    let mut parts = vec![dir.to_path_buf()];
    parts.extend(std::env::split_paths(&current));
    if let Ok(joined) = std::env::join_paths(parts) {
        unsafe { std::env::set_var("PATH", joined) };
    }
}

async fn find_compatible(config: &StackConfig) -> Option<PathBuf> {
    let python = find_executable("python3").await?;
    let probe = probe_interpreter(&python).await;
    match probe.version {
        Some(version) if config.interpreter_floor.satisfied_by(&version) => Some(python),
        Some(version) => {
            debug!(%version, "interpreter on PATH is below the version floor");
            None
        }
        None => None,
    }
}

/// Run `--version` and parse the reported version. Older interpreters
/// printed it on stderr, so both streams are consulted.
pub async fn probe_interpreter(python: &Path) -> DependencyProbe {
    let output = match Command::new(python).arg("--version").output().await {
        Ok(output) if output.status.success() => output,
        _ => return DependencyProbe::absent(),
    };

    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).into_owned()
    } else {
        String::from_utf8_lossy(&output.stdout).into_owned()
    };
    DependencyProbe {
        found: true,
        version: extract_version(&text),
    }
}

/// `which` on unix, `where` on Windows; the first match wins.
pub async fn find_executable(name: &str) -> Option<PathBuf> {
    let finder = if cfg!(windows) { "where" } else { "which" };
    let output = Command::new(finder).arg(name).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .next()
        .map(|line| PathBuf::from(line.trim()))
}

/// Stream `--version` checks for the interpreter and pip through the
/// runner so the operator sees the child output.
pub async fn verify_interpreter(
    python: &Path,
    runner: &CommandRunner,
) -> Result<(), InterpreterError> {
    println!("Verifying Python installation...");
    let python_cmd = python.to_string_lossy();
    for args in [&["--version"][..], &["-m", "pip", "--version"][..]] {
        let code = runner.run(&python_cmd, args).await.context(RunnerSnafu)?;
        if code != 0 {
            return InstallStepSnafu {
                step: format!("{python_cmd} {}", args.join(" ")),
                code,
            }
            .fail();
        }
    }
    Ok(())
}

/// Install `<dir>/requirements.txt` when present. Returns whether an
/// install actually ran.
pub async fn install_requirements(
    python: &Path,
    runner: &CommandRunner,
    dir: &Path,
) -> Result<bool, InterpreterError> {
    let requirements = dir.join("requirements.txt");
    if !requirements.exists() {
        return Ok(false);
    }

    println!("Installing dependencies from requirements.txt...");
    let python_cmd = python.to_string_lossy();
    let requirements_arg = requirements.to_string_lossy();
    let args = ["-m", "pip", "install", "-r", requirements_arg.as_ref()];
    let code = runner.run(&python_cmd, &args).await.context(RunnerSnafu)?;
    if code != 0 {
        return InstallStepSnafu {
            step: format!("{python_cmd} -m pip install -r {requirements_arg}"),
            code,
        }
        .fail();
    }
    Ok(true)
}
