//! Read-only memory mapping of the setup binary.
//!
//! The bootstrapper maps its own running executable to reach the appended
//! archive without copying it. The OS keeps an in-use binary readable for
//! shared mapping on the platforms we ship to; where it cannot, the map
//! call fails with the underlying error rather than handing out bad bytes.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use thiserror::Error;

/// Errors opening or mapping a file.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("Unable to open {path} for mapping: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },

    #[error("Unable to memory-map {path}: {source}")]
    Map {
        path: String,
        source: std::io::Error,
    },
}

/// An owned, read-only view over a file's bytes.
///
/// The mapping is released when the region is dropped; there is no separate
/// unmap call to forget or double-issue.
#[derive(Debug)]
pub struct MappedRegion {
    map: memmap2::Mmap,
}

impl MappedRegion {
    /// Map `path` read-only in its entirety.
    pub fn map(path: &Path) -> Result<Self, MapError> {
        let file = File::open(path).map_err(|source| MapError::Open {
            path: path.display().to_string(),
            source,
        })?;

        // Safety: the map is read-only and private to this process. A
        // concurrent truncation of the backing file could still fault, but
        // the bootstrapper only maps its own executable, which the OS pins
        // while it runs.
        #[allow(unsafe_code)]
        let map = unsafe { memmap2::Mmap::map(&file) }.map_err(|source| MapError::Map {
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!(path = %path.display(), len = map.len(), "mapped file read-only");
        Ok(Self { map })
    }
}

impl Deref for MappedRegion {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}
