//! Temp-file placement for the extracted updater.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};

/// Environment variable overriding where the updater is staged. Ignored
/// unless it names an existing, writable directory.
pub const TEMP_DIR_ENV: &str = "STAGER_TEMP";

fn dir_is_writable(path: &Path) -> bool {
    Builder::new().prefix(".stager-probe").tempfile_in(path).is_ok()
}

/// Directory the updater is extracted into: the override when usable,
/// otherwise the system temp directory.
pub fn staging_dir() -> PathBuf {
    if let Ok(val) = env::var(TEMP_DIR_ENV) {
        let path = PathBuf::from(val);
        if path.is_dir() && dir_is_writable(&path) {
            return path;
        }
        tracing::warn!(path = %path.display(), "ignoring unusable {TEMP_DIR_ENV} override");
    }
    env::temp_dir()
}

/// Reserve a uniquely-named temp path for the extracted updater.
///
/// The returned [`TempPath`] deletes the file when dropped, so an early
/// error return cannot leak it; the bootstrapper also closes it explicitly
/// during cleanup.
pub fn updater_temp_file() -> io::Result<TempPath> {
    let mut builder = Builder::new();
    builder.prefix("stager");
    if cfg!(windows) {
        builder.suffix(".exe");
    }
    Ok(builder.tempfile_in(staging_dir())?.into_temp_path())
}
