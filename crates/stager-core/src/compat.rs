//! Preflight compatibility checks.
//!
//! Three independent checks run before anything is written to disk, in a
//! fixed order chosen so the cheapest and most common failure (disk space)
//! is reported first: disk space, then minimum OS version, then CPU
//! architecture. The first failure wins; later checks are irrelevant once
//! one has failed.

use thiserror::Error;

use stager_schema::{MinVersion, OsVersion};

use crate::manifest::Manifest;
use crate::platform::{PlatformError, PlatformOps};

/// Disk reserved beyond the archive itself for install-time duplication and
/// staging by the second stage.
pub const INSTALL_OVERHEAD_BYTES: u64 = 50_000_000;

/// A failed preflight check, carrying the values behind the verdict.
#[derive(Error, Debug)]
pub enum CompatError {
    #[error(
        "Insufficient disk space. This application requires at least {} free space to be installed, and only {} is available.",
        pretty_bytes(.required),
        pretty_bytes(.available)
    )]
    DiskSpace { required: u64, available: u64 },

    /// Inability to measure free space fails closed.
    #[error("Unable to verify sufficient available free space on disk. {0}")]
    DiskProbe(PlatformError),

    #[error("This application requires OS version {required} or later (this machine is running {running}).")]
    OsVersion {
        required: OsVersion,
        running: OsVersion,
    },

    #[error("Unable to verify the OS version is supported. {0}")]
    OsProbe(PlatformError),

    #[error("This application ({required}) does not support this machine's CPU architecture ({host}).")]
    Architecture { required: String, host: String },
}

/// Runs the preflight checks against a [`PlatformOps`] implementation.
#[derive(Debug)]
pub struct CompatibilityChecker<'a, P: PlatformOps> {
    platform: &'a P,
}

impl<'a, P: PlatformOps> CompatibilityChecker<'a, P> {
    pub fn new(platform: &'a P) -> Self {
        Self { platform }
    }

    /// Bytes that must be free before installation proceeds: the archive
    /// itself, a working copy of it, and its expanded contents coexist
    /// transiently, plus the fixed staging overhead.
    pub fn required_space(compressed_size: u64, uncompressed_size: u64) -> u64 {
        INSTALL_OVERHEAD_BYTES + compressed_size * 2 + uncompressed_size
    }

    /// Run all checks in order, stopping at the first failure.
    pub fn check_all(
        &self,
        compressed_size: u64,
        uncompressed_size: u64,
        manifest: Option<&Manifest>,
    ) -> Result<(), CompatError> {
        self.check_disk_space(compressed_size, uncompressed_size)?;
        self.check_os_version(manifest.and_then(|m| m.minimum_os_version.as_deref()))?;
        self.check_machine_arch(manifest.and_then(|m| m.machine_architecture.as_deref()))?;
        Ok(())
    }

    /// Compare required bytes against free space on the volume hosting the
    /// per-user application-data directory.
    pub fn check_disk_space(
        &self,
        compressed_size: u64,
        uncompressed_size: u64,
    ) -> Result<(), CompatError> {
        let required = Self::required_space(compressed_size, uncompressed_size);
        let target = self.platform.app_data_dir().map_err(CompatError::DiskProbe)?;
        let available = self
            .platform
            .available_space(&target)
            .map_err(CompatError::DiskProbe)?;

        tracing::debug!(required, available, target = %target.display(), "disk space preflight");
        if available >= required {
            Ok(())
        } else {
            Err(CompatError::DiskSpace { required, available })
        }
    }

    /// Compare the running OS version against the package's minimum, or
    /// against the bootstrapper's own floor when the package declares none.
    pub fn check_os_version(&self, constraint: Option<&str>) -> Result<(), CompatError> {
        let min = constraint.and_then(|raw| match raw.parse::<MinVersion>() {
            Ok(min) => Some(min),
            Err(err) => {
                tracing::warn!(raw, %err, "ignoring unparseable minimum OS version");
                None
            }
        });

        let required = match min {
            Some(min) => self.platform.normalize_minimum(&min),
            None => match self.platform.minimum_supported() {
                Some(floor) => floor,
                None => return Ok(()),
            },
        };

        let running = self.platform.os_version().map_err(CompatError::OsProbe)?;
        tracing::debug!(%required, %running, "OS version preflight");
        if running >= required {
            Ok(())
        } else {
            Err(CompatError::OsVersion { required, running })
        }
    }

    /// Compare the hardware architecture against the package's declared
    /// architecture through the compatibility matrix. An unrecognized host
    /// or an undeclared requirement passes.
    pub fn check_machine_arch(&self, constraint: Option<&str>) -> Result<(), CompatError> {
        let Some(required) = constraint else {
            return Ok(());
        };
        let Some(host) = self.platform.machine_arch() else {
            tracing::debug!("host architecture unrecognized, skipping check");
            return Ok(());
        };

        let compatible = required
            .parse()
            .is_ok_and(|pkg| host.runs_package(pkg, self.platform.supports_x64_emulation()));

        tracing::debug!(required, %host, compatible, "architecture preflight");
        if compatible {
            Ok(())
        } else {
            Err(CompatError::Architecture {
                required: required.to_string(),
                host: host.to_string(),
            })
        }
    }
}

/// Human-readable byte count for dialog text.
fn pretty_bytes(bytes: &u64) -> String {
    let kb = *bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}
