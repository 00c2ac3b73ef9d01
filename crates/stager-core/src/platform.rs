//! Platform capability seam.
//!
//! Everything the preflight checks and error reporting need from the host
//! OS sits behind [`PlatformOps`], keeping the orchestrator and the archive
//! reader platform-agnostic. [`NativePlatform`] is the production
//! implementation; tests supply their own.

use std::path::{Path, PathBuf};

use thiserror::Error;

use stager_schema::{Arch, MinVersion, OsVersion, VersionPolicy};

/// Errors from platform queries.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Unable to locate the local application data directory.")]
    NoAppDataDir,

    #[error("Unable to query free disk space for {path}: {source}")]
    DiskSpace {
        path: String,
        source: std::io::Error,
    },

    #[error("Unable to determine the running OS version ({0}).")]
    UnknownOsVersion(String),
}

/// Host-OS capabilities consumed by the bootstrapper.
pub trait PlatformOps {
    /// The running OS version.
    fn os_version(&self) -> Result<OsVersion, PlatformError>;

    /// The hardware CPU architecture, or `None` when unrecognized.
    ///
    /// This must report the real silicon, not the architecture an
    /// emulation layer presents to the process.
    fn machine_arch(&self) -> Option<Arch>;

    /// Free bytes on the volume hosting `path`.
    fn available_space(&self, path: &Path) -> Result<u64, PlatformError>;

    /// The per-user application-data directory, whose volume receives the
    /// installation.
    fn app_data_dir(&self) -> Result<PathBuf, PlatformError>;

    /// The oldest OS version this bootstrapper itself supports, applied
    /// when a package declares no minimum of its own. `None` means no
    /// floor.
    fn minimum_supported(&self) -> Option<OsVersion> {
        None
    }

    /// Map a manifest minimum-version constraint onto a version comparable
    /// with [`PlatformOps::os_version`].
    fn normalize_minimum(&self, min: &MinVersion) -> OsVersion {
        min.floor()
    }

    /// Whether the running OS can translate x64 binaries on an ARM64 host.
    fn supports_x64_emulation(&self) -> bool {
        false
    }

    /// Show a blocking error dialog (or the closest native equivalent).
    fn show_error(&self, title: &str, message: &str);
}

/// Production [`PlatformOps`] implementation.
#[derive(Debug, Clone, Default)]
pub struct NativePlatform {
    policy: VersionPolicy,
}

impl NativePlatform {
    /// Platform ops with the default version policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform ops with a revised version policy.
    pub fn with_policy(policy: VersionPolicy) -> Self {
        Self { policy }
    }
}

impl PlatformOps for NativePlatform {
    fn os_version(&self) -> Result<OsVersion, PlatformError> {
        let info = os_info::get();
        match info.version() {
            os_info::Version::Semantic(major, minor, patch) => {
                Ok(OsVersion::new(*major, *minor, *patch))
            }
            other => other
                .to_string()
                .parse::<MinVersion>()
                .map(|v| v.floor())
                .map_err(|_| PlatformError::UnknownOsVersion(other.to_string())),
        }
    }

    #[cfg(windows)]
    fn machine_arch(&self) -> Option<Arch> {
        native_machine_arch()
    }

    #[cfg(not(windows))]
    fn machine_arch(&self) -> Option<Arch> {
        if let Some(machine) = os_info::get().architecture() {
            if let Ok(arch) = machine.parse() {
                return Some(arch);
            }
        }
        std::env::consts::ARCH.parse().ok()
    }

    fn available_space(&self, path: &Path) -> Result<u64, PlatformError> {
        fs4::available_space(path).map_err(|source| PlatformError::DiskSpace {
            path: path.display().to_string(),
            source,
        })
    }

    fn app_data_dir(&self) -> Result<PathBuf, PlatformError> {
        dirs::data_local_dir().ok_or(PlatformError::NoAppDataDir)
    }

    #[cfg(windows)]
    fn minimum_supported(&self) -> Option<OsVersion> {
        // Windows 7 SP1.
        Some(OsVersion::new(6, 1, 7601))
    }

    #[cfg(windows)]
    fn normalize_minimum(&self, min: &MinVersion) -> OsVersion {
        self.policy.normalize_windows(min)
    }

    fn supports_x64_emulation(&self) -> bool {
        #[cfg(windows)]
        {
            // x64-on-ARM64 translation shipped with Windows 11.
            let threshold = OsVersion::new(10, 0, self.policy.eleven_first_build);
            self.os_version().map(|v| v >= threshold).unwrap_or(false)
        }
        #[cfg(target_os = "macos")]
        {
            // Rosetta 2 is present on every Apple Silicon macOS release.
            true
        }
        #[cfg(not(any(windows, target_os = "macos")))]
        {
            false
        }
    }

    #[cfg(windows)]
    fn show_error(&self, title: &str, message: &str) {
        use windows::Win32::UI::WindowsAndMessaging::{MB_ICONERROR, MB_OK, MessageBoxW};
        use windows::core::PCWSTR;

        let to_wide = |s: &str| s.encode_utf16().chain(std::iter::once(0)).collect::<Vec<u16>>();
        let text = to_wide(message);
        let caption = to_wide(title);
        #[allow(unsafe_code)]
        unsafe {
            MessageBoxW(
                None,
                PCWSTR(text.as_ptr()),
                PCWSTR(caption.as_ptr()),
                MB_OK | MB_ICONERROR,
            );
        }
    }

    #[cfg(not(windows))]
    fn show_error(&self, title: &str, message: &str) {
        // No dialog facility to speak of; stderr is the native equivalent.
        eprintln!("{title}: {message}");
    }
}

/// Hardware architecture via `IsWow64Process2`, which reports the native
/// machine even when this process runs under emulation. Falls back to the
/// older WOW query, then to the compile-time architecture.
#[cfg(windows)]
fn native_machine_arch() -> Option<Arch> {
    use windows::Win32::Foundation::BOOL;
    use windows::Win32::System::SystemInformation::IMAGE_FILE_MACHINE;
    use windows::Win32::System::Threading::{GetCurrentProcess, IsWow64Process, IsWow64Process2};

    #[allow(unsafe_code)]
    unsafe {
        let process = GetCurrentProcess();

        let mut process_machine = IMAGE_FILE_MACHINE::default();
        let mut native_machine = IMAGE_FILE_MACHINE::default();
        if IsWow64Process2(process, &mut process_machine, Some(&mut native_machine)).is_ok() {
            return match native_machine.0 {
                0x014c => Some(Arch::X86),
                0x8664 => Some(Arch::X64),
                0xAA64 => Some(Arch::Arm64),
                _ => None,
            };
        }

        let mut is_wow64 = BOOL::default();
        if IsWow64Process(process, &mut is_wow64).is_ok() && is_wow64.as_bool() {
            return Some(Arch::X64);
        }

        Some(Arch::compiled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_machine_arch_is_recognized() {
        // Whatever machine runs the tests should be in the known set.
        let arch = NativePlatform::new().machine_arch();
        assert!(arch.is_some());
    }

    #[test]
    fn test_app_data_dir_resolves() {
        assert!(NativePlatform::new().app_data_dir().is_ok());
    }

    #[test]
    fn test_available_space_on_temp_dir() {
        let platform = NativePlatform::new();
        let space = platform.available_space(&std::env::temp_dir()).unwrap();
        assert!(space > 0);
    }
}
