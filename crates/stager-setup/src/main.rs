//! setup - bootstraps installation of the bundled application.

use std::ffi::OsString;
use std::fs::File;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stager_core::platform::{NativePlatform, PlatformOps};
use stager_setup::{Bootstrapper, Cli, PayloadSource, SetupError, error_dialog_title};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "starting setup");

    // The updater receives every argument this process received, verbatim
    // and in order, after the hand-off flags.
    let raw_args: Vec<OsString> = std::env::args_os().skip(1).collect();

    let platform = NativePlatform::new();
    if let Err(err) = run(platform.clone(), &raw_args) {
        error!("{err}");
        if !cli.silent {
            platform.show_error(
                &error_dialog_title(),
                &format!("An error occurred while running setup. {err}"),
            );
        }
    }

    // Exit 0 regardless: the dialog is the user-visible signal, and no
    // caller interprets this process's exit code.
    Ok(())
}

fn run(platform: NativePlatform, raw_args: &[OsString]) -> Result<(), SetupError> {
    let current_exe = std::env::current_exe()?;
    let source =
        PayloadSource::resolve(&current_exe, raw_args).ok_or(SetupError::NoPayload)?;

    Bootstrapper::new(platform, source, raw_args.to_vec()).run()
}

fn init_logging(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // An unusable log file must not abort setup; fall back to the console.
    let log_file = cli.log.as_ref().and_then(|path| File::create(path).ok());
    match log_file {
        Some(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            if cli.log.is_some() {
                tracing::warn!("unable to open the requested log file, logging to console");
            }
        }
    }
}
