//! Setup-level errors shown to the user.

use thiserror::Error;

use stager_core::archive::ArchiveError;
use stager_core::compat::CompatError;
use stager_core::mmap::MapError;
use stager_core::process::ProcessError;

/// Any failure that terminates the bootstrap pipeline. All variants are
/// terminal: this process runs once and either launches the updater or
/// reports one of these and exits.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error(
        "The embedded package containing the application to install was not found. Please contact the application author."
    )]
    NoPayload,

    #[error("Unable to map the setup binary. Is there enough available system memory? {0}")]
    Map(#[from] MapError),

    #[error(
        "The setup package appears to be corrupt: the recorded payload range {offset}..{end} exceeds the {file_len}-byte setup binary."
    )]
    PayloadOutOfBounds { offset: i64, end: i64, file_len: u64 },

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Compat(#[from] CompatError),

    #[error("This installer is missing a critical binary ({0}). Please contact the application author.")]
    MissingUpdater(&'static str),

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(
        "The install process exited with error code {code}. There may be more information in the application's log directory."
    )]
    UpdaterFailed { code: i32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
