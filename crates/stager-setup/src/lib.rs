//! stager setup - first-stage installer bootstrapper.
//!
//! This binary runs before any application code exists: it finds the update
//! package appended to its own executable, verifies the machine can host
//! it, extracts the second-stage updater, and hands control to it. Any
//! failure surfaces in a native error dialog and the process exits 0; the
//! dialog is the user-visible signal, there is no caller checking the exit
//! code.

pub mod bootstrap;
pub mod error;

pub use bootstrap::{Bootstrapper, PayloadSource};
pub use error::SetupError;

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments.
///
/// Anything beyond the bootstrapper's own flags is accepted and, like the
/// full original argument list, forwarded to the updater verbatim.
#[derive(Debug, Parser)]
#[command(name = "setup", version, about = "Installs the application bundled with this binary")]
pub struct Cli {
    /// Hide all dialogs; errors go to the log only
    #[arg(short, long)]
    pub silent: bool,

    /// Print debug messages
    #[arg(short, long)]
    pub verbose: bool,

    /// Write log output to a file instead of the console
    #[arg(short, long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Arguments passed through to the application updater
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub args: Vec<OsString>,
}

/// Dialog title: the running binary's file name plus " Error", with a
/// fallback when the name cannot be determined.
pub fn error_dialog_title() -> String {
    let name = std::env::current_exe()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "Setup".to_string());
    format!("{name} Error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_accepts_unknown_trailing_args() {
        let cli = Cli::parse_from(["setup", "--silent", "--some-app-flag", "value"]);
        assert!(cli.silent);
        assert_eq!(cli.args, [OsString::from("--some-app-flag"), OsString::from("value")]);
    }

    #[test]
    fn test_error_dialog_title_names_the_binary() {
        let title = error_dialog_title();
        assert!(title.ends_with(" Error"));
    }
}
