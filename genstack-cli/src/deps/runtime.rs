//! .NET runtime probing. Detect-only: installing a system-wide language
//! runtime unattended is too invasive, so the policy is to report and let
//! the operator install it.

use semver::Version;
use tokio::process::Command;
use tracing::debug;

use super::DependencyProbe;
use crate::config::StackConfig;

/// Probe installed SDKs and enforce the version floor. Returns false (with
/// a console diagnostic) when no SDK is found or the best one is too old.
pub async fn ensure_runtime(config: &StackConfig) -> bool {
    let probe = probe_runtime(&config.runtime_bin).await;

    let Some(version) = probe.version else {
        println!("No .NET SDK installation detected.");
        return false;
    };

    println!("Detected .NET SDK version {version}");

    if !config.runtime_floor.satisfied_by(&version) {
        println!(
            ".NET SDK version {version} is below required version {}.0",
            config.runtime_floor.major_min
        );
        return false;
    }

    println!(".NET SDK version {version} meets requirements.");
    true
}

/// Enumerate installed SDKs via `--list-sdks` and keep the highest
/// parsable version.
pub async fn probe_runtime(runtime_bin: &str) -> DependencyProbe {
    let output = match Command::new(runtime_bin).arg("--list-sdks").output().await {
        Ok(output) => output,
        Err(err) => {
            debug!(runtime_bin, error = %err, "runtime introspection command failed to run");
            return DependencyProbe::absent();
        }
    };

    if !output.status.success() {
        debug!(runtime_bin, code = ?output.status.code(), "runtime introspection exited non-zero");
        return DependencyProbe::absent();
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let version = highest_sdk_version(&stdout);
    DependencyProbe {
        found: version.is_some(),
        version,
    }
}

/// Each `--list-sdks` line looks like `8.0.100 [/usr/share/dotnet/sdk]`;
/// the version is the first whitespace-separated token.
pub(crate) fn highest_sdk_version(output: &str) -> Option<Version> {
    output
        .lines()
        .filter_map(|line| {
            let token = line.split_whitespace().next()?;
            Version::parse(token).ok()
        })
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_highest_installed_sdk() {
        let output = "6.0.428 [/usr/share/dotnet/sdk]\n\
                      8.0.100 [/usr/share/dotnet/sdk]\n\
                      7.0.410 [/usr/share/dotnet/sdk]\n";
        assert_eq!(highest_sdk_version(output), Some(Version::new(8, 0, 100)));
    }

    #[test]
    fn unparsable_lines_are_ignored() {
        let output = "garbage line\n8.0.100 [/usr/share/dotnet/sdk]\n";
        assert_eq!(highest_sdk_version(output), Some(Version::new(8, 0, 100)));
    }

    #[test]
    fn empty_output_yields_none() {
        assert_eq!(highest_sdk_version(""), None);
        assert_eq!(highest_sdk_version("not a version\n"), None);
    }
}
