//! Dependency probing and installation.
//!
//! The server runtime is detect-only; the Python interpreter can be
//! installed per platform policy. Probes are produced fresh on every
//! ensure call and never persisted.

pub mod interpreter;
pub mod runtime;

pub use interpreter::{ensure_interpreter, install_requirements, verify_interpreter};
pub use runtime::ensure_runtime;

use semver::Version;

/// How a probed version is tested against its floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionPolicy {
    /// Any major at or above the floor (runtime case).
    MajorFloor,
    /// Exact major with a minor floor (interpreter case).
    ExactMajor,
}

#[derive(Debug, Clone, Copy)]
pub struct VersionRequirement {
    pub major_min: u64,
    pub minor_min: u64,
    pub policy: VersionPolicy,
}

impl VersionRequirement {
    pub const fn major_floor(major_min: u64) -> Self {
        Self {
            major_min,
            minor_min: 0,
            policy: VersionPolicy::MajorFloor,
        }
    }

    pub const fn exact_major(major_min: u64, minor_min: u64) -> Self {
        Self {
            major_min,
            minor_min,
            policy: VersionPolicy::ExactMajor,
        }
    }

    pub fn satisfied_by(&self, version: &Version) -> bool {
        match self.policy {
            VersionPolicy::MajorFloor => version.major >= self.major_min,
            VersionPolicy::ExactMajor => {
                version.major == self.major_min && version.minor >= self.minor_min
            }
        }
    }
}

/// Snapshot of a single probe.
#[derive(Debug)]
pub struct DependencyProbe {
    pub found: bool,
    pub version: Option<Version>,
}

impl DependencyProbe {
    pub const fn absent() -> Self {
        Self {
            found: false,
            version: None,
        }
    }
}

/// Extract a version from command output.
/// Handles "Python 3.9.13", "8.0.100 [/usr/share/dotnet/sdk]", "v1.2.3"
/// and bare "3.9".
pub(crate) fn extract_version(output: &str) -> Option<Version> {
    let re = regex::Regex::new(r"v?(\d+)\.(\d+)(?:\.(\d+))?").ok()?;
    let caps = re.captures(output)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    let patch = caps
        .get(3)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Some(Version::new(major, minor, patch))
}
