pub mod archive;
pub mod compat;
pub mod manifest;
pub mod mmap;
pub mod paths;
pub mod platform;
pub mod process;

// Re-exports
pub use archive::{Archive, ArchiveEntry, ArchiveError};
pub use compat::{CompatError, CompatibilityChecker};
pub use manifest::Manifest;
pub use mmap::{MapError, MappedRegion};
pub use platform::{NativePlatform, PlatformError, PlatformOps};
pub use process::{LaunchRequest, ProcessError};

/// File name of the second-stage updater binary inside the bundle. Entries
/// are matched by suffix, so the packaging tool is free to nest it under
/// any directory prefix.
#[cfg(windows)]
pub const UPDATER_FILE_NAME: &str = "Updater.exe";
/// File name of the second-stage updater binary inside the bundle.
#[cfg(not(windows))]
pub const UPDATER_FILE_NAME: &str = "Updater";

/// Suffix of the archive entry carrying the package manifest.
pub const MANIFEST_SUFFIX: &str = ".nuspec";
