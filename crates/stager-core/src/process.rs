//! Second-stage process hand-off.
//!
//! The extracted updater is launched with a typed argument list and waited
//! on synchronously, with no timeout: the updater may show its own UI and
//! wait on the user for an arbitrarily long time. Exit-code interpretation
//! is the orchestrator's job.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;

/// Errors spawning or waiting on the updater process.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Unable to start the install process: {0}")]
    Spawn(std::io::Error),

    /// The child terminated without an exit code (killed by a signal).
    #[error("The install process was terminated before reporting an exit code.")]
    NoExitCode,
}

/// The exact command line handed to the second-stage updater.
///
/// Constructed once, consumed once: setup mode flag, the path of the
/// original setup binary, the payload offset within it, then every
/// argument the bootstrapper itself received, verbatim and in order.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Path of the extracted updater binary.
    pub updater: PathBuf,
    /// Path of the binary carrying the payload (the setup binary itself,
    /// or the archive file in debug runs).
    pub source_binary: PathBuf,
    /// Byte offset of the payload within `source_binary`.
    pub payload_offset: i64,
    /// Original bootstrapper arguments, forwarded untouched.
    pub forwarded: Vec<OsString>,
}

impl LaunchRequest {
    /// Build the updater command line.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.updater);
        cmd.arg("--setup")
            .arg(&self.source_binary)
            .arg("--setupOffset")
            .arg(self.payload_offset.to_string())
            .args(&self.forwarded);
        cmd
    }

    /// Spawn the updater and block until it exits.
    pub fn run_and_wait(&self) -> Result<i32, ProcessError> {
        tracing::info!(
            updater = %self.updater.display(),
            source = %self.source_binary.display(),
            offset = self.payload_offset,
            "launching updater"
        );
        let status = self.to_command().status().map_err(ProcessError::Spawn)?;
        let code = status.code().ok_or(ProcessError::NoExitCode)?;
        tracing::info!(code, "updater exited");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_argument_order() {
        let request = LaunchRequest {
            updater: PathBuf::from("/tmp/updater"),
            source_binary: PathBuf::from("/opt/Setup.exe"),
            payload_offset: 4096,
            forwarded: vec![OsString::from("--silent"), OsString::from("extra")],
        };

        let cmd = request.to_command();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            ["--setup", "/opt/Setup.exe", "--setupOffset", "4096", "--silent", "extra"]
        );
        assert_eq!(cmd.get_program(), "/tmp/updater");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_and_wait_returns_exit_code() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("updater");
        let mut file = std::fs::File::create(&script).unwrap();
        file.write_all(b"#!/bin/sh\nexit 3\n").unwrap();
        drop(file);
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let request = LaunchRequest {
            updater: script,
            source_binary: PathBuf::from("/dev/null"),
            payload_offset: 0,
            forwarded: Vec::new(),
        };
        assert_eq!(request.run_and_wait().unwrap(), 3);
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let request = LaunchRequest {
            updater: dir.path().join("does-not-exist"),
            source_binary: PathBuf::from("/dev/null"),
            payload_offset: 0,
            forwarded: Vec::new(),
        };
        assert!(matches!(request.run_and_wait(), Err(ProcessError::Spawn(_))));
    }
}
