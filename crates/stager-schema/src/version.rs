//! OS version values and the minimum-version constraints packages declare.
//!
//! These are `major.minor.build` triples, not semver: a package manifest may
//! omit trailing components ("no additional constraint"), and a bare major
//! version like "11" is not directly comparable to a build number on
//! platforms where the kernel keeps reporting the previous major version.

use std::cmp::Ordering;

use thiserror::Error;

/// A concrete, fully-known OS version as reported by the running system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsVersion {
    /// Major version component.
    pub major: u64,
    /// Minor version component.
    pub minor: u64,
    /// Build (or patch) number.
    pub build: u64,
}

impl OsVersion {
    /// Construct a version from its three components.
    pub fn new(major: u64, minor: u64, build: u64) -> Self {
        Self { major, minor, build }
    }
}

impl Ord for OsVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.build).cmp(&(other.major, other.minor, other.build))
    }
}

impl PartialOrd for OsVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for OsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Error returned when a minimum-version string cannot be parsed at all.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("Invalid version string: {0:?}")]
pub struct VersionParseError(pub String);

/// A minimum-version constraint from a package manifest.
///
/// Missing components are recorded as absent, not zero: "10.0" constrains
/// major and minor but says nothing about the build number. Components past
/// the third are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinVersion {
    /// Required major version.
    pub major: u64,
    /// Required minor version, if constrained.
    pub minor: Option<u64>,
    /// Required build number, if constrained.
    pub build: Option<u64>,
}

impl MinVersion {
    /// The lowest concrete version satisfying this constraint, with absent
    /// components treated as zero. Platform-specific normalization (see
    /// [`VersionPolicy`]) applies on top of this where needed.
    pub fn floor(&self) -> OsVersion {
        OsVersion::new(self.major, self.minor.unwrap_or(0), self.build.unwrap_or(0))
    }
}

impl std::str::FromStr for MinVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let major = parts
            .next()
            .filter(|p| !p.is_empty())
            .and_then(|p| p.parse().ok())
            .ok_or_else(|| VersionParseError(s.to_string()))?;
        let minor = parts.next().and_then(|p| p.parse().ok());
        let build = parts.next().and_then(|p| p.parse().ok());
        Ok(Self { major, minor, build })
    }
}

/// Version thresholds that OS vendors revise over time.
///
/// Kept as data rather than hard-coded comparisons so packaging can ship a
/// revised threshold without a new bootstrapper build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionPolicy {
    /// First build number the vendor assigned to Windows 11. The kernel
    /// reports major version 10 on Windows 11, so a requested major of 11
    /// only becomes comparable once mapped onto this build number.
    pub eleven_first_build: u64,
}

impl Default for VersionPolicy {
    fn default() -> Self {
        Self { eleven_first_build: 22000 }
    }
}

impl VersionPolicy {
    /// Normalize a Windows minimum-version constraint to a concrete version
    /// comparable against what the kernel reports.
    ///
    /// A requested major of 11 maps to `10.0.x` where `x` is at least the
    /// first Windows 11 build; everything else falls back to
    /// [`MinVersion::floor`].
    pub fn normalize_windows(&self, min: &MinVersion) -> OsVersion {
        if min.major == 11 {
            let build = match min.build {
                Some(b) if b >= self.eleven_first_build => b,
                _ => self.eleven_first_build,
            };
            return OsVersion::new(10, 0, build);
        }
        min.floor()
    }
}
