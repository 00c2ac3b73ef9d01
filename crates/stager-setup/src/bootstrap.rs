//! The bootstrap pipeline.
//!
//! A single linear pass with no retries: locate the payload, map the setup
//! binary if the payload is embedded, open the archive, run the preflight
//! checks, extract the updater to a temp file, launch it, and clean up.
//! Cleanup runs on every exit path, success or failure.

use std::ffi::OsString;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, info, warn};

use stager_core::archive::Archive;
use stager_core::compat::CompatibilityChecker;
use stager_core::mmap::MappedRegion;
use stager_core::platform::PlatformOps;
use stager_core::process::LaunchRequest;
use stager_core::{UPDATER_FILE_NAME, paths};
use stager_schema::BundleMarker;
use stager_schema::marker;

use crate::error::SetupError;

/// Where the update archive lives for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadSource {
    /// Appended to `binary` at the range the marker records.
    Embedded {
        /// The setup binary carrying the payload.
        binary: PathBuf,
        /// Offset and length of the payload within it.
        marker: BundleMarker,
    },
    /// A whole archive file on disk (debug-build override).
    External {
        /// Path of the archive file.
        path: PathBuf,
    },
}

impl PayloadSource {
    /// Resolve the payload for this process: the in-image marker when the
    /// packaging tool wrote one; otherwise, in debug builds only, a single
    /// command-line argument naming an existing file.
    pub fn resolve(current_exe: &Path, raw_args: &[OsString]) -> Option<Self> {
        if let Some(marker) = marker::embedded() {
            debug!(offset = marker.offset, length = marker.length, "found embedded payload marker");
            return Some(Self::Embedded { binary: current_exe.to_path_buf(), marker });
        }

        if cfg!(debug_assertions) && raw_args.len() == 1 && !raw_args[0].is_empty() {
            let path = PathBuf::from(&raw_args[0]);
            if path.is_file() {
                debug!(path = %path.display(), "using archive file from command line");
                return Some(Self::External { path });
            }
        }

        None
    }

    /// The binary path the updater is told to read the payload from.
    pub fn source_binary(&self) -> &Path {
        match self {
            Self::Embedded { binary, .. } => binary,
            Self::External { path } => path,
        }
    }

    /// The payload offset the updater is told about.
    pub fn payload_offset(&self) -> i64 {
        match self {
            Self::Embedded { marker, .. } => marker.offset,
            Self::External { .. } => 0,
        }
    }
}

/// Orchestrates one bootstrap run. Owns every resource with a release
/// obligation for the lifetime of the process.
pub struct Bootstrapper<P: PlatformOps> {
    platform: P,
    source: PayloadSource,
    forwarded: Vec<OsString>,
    updater_temp: Option<TempPath>,
}

impl<P: PlatformOps> Bootstrapper<P> {
    /// A bootstrapper for the given payload, forwarding `forwarded` to the
    /// updater untouched.
    pub fn new(platform: P, source: PayloadSource, forwarded: Vec<OsString>) -> Self {
        Self { platform, source, forwarded, updater_temp: None }
    }

    /// Run the pipeline to completion, cleaning up on every exit path.
    pub fn run(&mut self) -> Result<(), SetupError> {
        let result = self.execute();
        self.cleanup();
        result
    }

    fn execute(&mut self) -> Result<(), SetupError> {
        match self.source.clone() {
            PayloadSource::Embedded { binary, marker } => {
                info!(binary = %binary.display(), offset = marker.offset, "opening embedded payload");
                let region = MappedRegion::map(&binary)?;

                let file_len = region.len() as u64;
                let end = marker.end();
                if !marker.is_present() || end as u64 > file_len {
                    return Err(SetupError::PayloadOutOfBounds {
                        offset: marker.offset,
                        end,
                        file_len,
                    });
                }

                let bytes = &region[marker.offset as usize..end as usize];
                let mut archive = Archive::from_bytes(bytes)?;
                self.stage_and_launch(&mut archive)
                // `region` unmaps here, after the archive borrowing it is gone.
            }
            PayloadSource::External { path } => {
                info!(path = %path.display(), "opening archive file");
                let mut archive = Archive::from_file(&path)?;
                self.stage_and_launch(&mut archive)
            }
        }
    }

    fn stage_and_launch<R: Read + Seek>(
        &mut self,
        archive: &mut Archive<R>,
    ) -> Result<(), SetupError> {
        info!(
            entries = archive.entries().len(),
            compressed = archive.compressed_size(),
            uncompressed = archive.uncompressed_size(),
            "archive opened"
        );
        if let Some(name) = archive.manifest().and_then(|m| m.display_name()) {
            info!(package = name, "read package manifest");
        }

        let checker = CompatibilityChecker::new(&self.platform);
        checker.check_all(
            archive.compressed_size(),
            archive.uncompressed_size(),
            archive.manifest(),
        )?;
        info!("preflight checks passed");

        let entry = archive
            .find_entry(UPDATER_FILE_NAME)
            .cloned()
            .ok_or(SetupError::MissingUpdater(UPDATER_FILE_NAME))?;

        // Reserve the temp path before writing so cleanup deletes it even
        // when extraction fails partway through.
        let temp = paths::updater_temp_file()?;
        let updater_path = temp.to_path_buf();
        self.updater_temp = Some(temp);
        archive.extract_to_file(&entry, &updater_path)?;
        info!(updater = %updater_path.display(), "extracted updater");

        let request = LaunchRequest {
            updater: updater_path,
            source_binary: self.source.source_binary().to_path_buf(),
            payload_offset: self.source.payload_offset(),
            forwarded: self.forwarded.clone(),
        };
        let code = request.run_and_wait()?;
        if code != 0 {
            return Err(SetupError::UpdaterFailed { code });
        }
        Ok(())
    }

    /// Unconditional, idempotent cleanup: delete the extracted updater if
    /// one was staged. The mapping and archive handle are scoped to
    /// `execute` and released there.
    fn cleanup(&mut self) {
        if let Some(temp) = self.updater_temp.take() {
            debug!(path = %temp.display(), "removing staged updater");
            if let Err(err) = temp.close() {
                warn!(%err, "unable to remove staged updater");
            }
        }
    }
}

impl<P: PlatformOps> Drop for Bootstrapper<P> {
    fn drop(&mut self) {
        self.cleanup();
    }
}
