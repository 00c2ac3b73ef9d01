//! End-to-end pipeline tests: a fixture "setup binary" with an appended
//! archive, a stub updater that records its argument list, and a fake
//! platform that always passes preflight.

use std::ffi::OsString;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use stager_core::platform::{PlatformError, PlatformOps};
use stager_schema::{Arch, BundleMarker, OsVersion};
use stager_setup::{Bootstrapper, PayloadSource, SetupError};

/// Serializes tests that redirect updater staging through `STAGER_TEMP`.
static STAGING_ENV: Mutex<()> = Mutex::new(());

struct FakePlatform;

impl PlatformOps for FakePlatform {
    fn os_version(&self) -> Result<OsVersion, PlatformError> {
        Ok(OsVersion::new(99, 0, 0))
    }

    fn machine_arch(&self) -> Option<Arch> {
        None
    }

    fn available_space(&self, _path: &Path) -> Result<u64, PlatformError> {
        Ok(u64::MAX)
    }

    fn app_data_dir(&self) -> Result<PathBuf, PlatformError> {
        Ok(std::env::temp_dir())
    }

    fn show_error(&self, _title: &str, _message: &str) {}
}

/// Test fixture: a scratch dir, a fake setup binary with an appended
/// archive, and a dedicated staging dir to observe temp-file cleanup.
struct TestContext {
    scratch: TempDir,
    staging: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            scratch: TempDir::new().expect("failed to create scratch dir"),
            staging: TempDir::new().expect("failed to create staging dir"),
        }
    }

    /// Build a zip whose `bundle/Updater` entry is a shell script writing
    /// its argument list to the file named by its fifth argument.
    fn updater_zip(&self, script_body: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "bundle/Updater",
                SimpleFileOptions::default().unix_permissions(0o755),
            )
            .unwrap();
        writer.write_all(script_body.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    /// Write `payload` appended to some leading junk, returning the fake
    /// binary's path and the marker describing the payload range.
    fn fake_binary(&self, payload: &[u8]) -> (PathBuf, BundleMarker) {
        let prefix = vec![0xABu8; 512];
        let path = self.scratch.path().join("Setup.bin");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&prefix).unwrap();
        file.write_all(payload).unwrap();
        drop(file);

        let marker = BundleMarker { offset: prefix.len() as i64, length: payload.len() as i64 };
        (path, marker)
    }

    fn staging_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.staging.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

fn with_staging_env<T>(staging: &Path, body: impl FnOnce() -> T) -> T {
    let _guard = STAGING_ENV.lock().unwrap();
    // Edition 2024 makes env mutation unsafe; the mutex keeps these tests
    // from interleaving.
    #[allow(unsafe_code)]
    unsafe {
        std::env::set_var("STAGER_TEMP", staging);
    }
    let result = body();
    #[allow(unsafe_code)]
    unsafe {
        std::env::remove_var("STAGER_TEMP");
    }
    result
}

#[cfg(unix)]
#[test]
fn test_full_pipeline_hands_off_and_cleans_up() {
    let ctx = TestContext::new();
    let out_path = ctx.scratch.path().join("observed-args.txt");

    // $5 is the first forwarded argument: the output path below.
    let zip_bytes = ctx.updater_zip("#!/bin/sh\nprintf '%s\\n' \"$@\" > \"$5\"\nexit 0\n");
    let (binary, marker) = ctx.fake_binary(&zip_bytes);

    let source = PayloadSource::Embedded { binary: binary.clone(), marker };
    let forwarded = vec![OsString::from(&out_path)];

    with_staging_env(ctx.staging.path(), || {
        Bootstrapper::new(FakePlatform, source, forwarded).run().unwrap();
    });

    let observed = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = observed.lines().collect();
    assert_eq!(
        lines,
        [
            "--setup",
            binary.to_str().unwrap(),
            "--setupOffset",
            "512",
            out_path.to_str().unwrap(),
        ]
    );

    // The staged updater was deleted after the hand-off.
    assert!(ctx.staging_files().is_empty());
}

#[cfg(unix)]
#[test]
fn test_updater_exit_code_is_surfaced_and_temp_removed() {
    let ctx = TestContext::new();
    let zip_bytes = ctx.updater_zip("#!/bin/sh\nexit 7\n");
    let (binary, marker) = ctx.fake_binary(&zip_bytes);

    let err = with_staging_env(ctx.staging.path(), || {
        Bootstrapper::new(
            FakePlatform,
            PayloadSource::Embedded { binary, marker },
            Vec::new(),
        )
        .run()
        .unwrap_err()
    });

    assert!(matches!(err, SetupError::UpdaterFailed { code: 7 }));
    assert!(err.to_string().contains("error code 7"));
    assert!(ctx.staging_files().is_empty());
}

#[test]
fn test_corrupt_archive_reports_decoder_error_and_writes_nothing() {
    let ctx = TestContext::new();
    let (binary, marker) = ctx.fake_binary(b"definitely not a zip archive");

    let err = with_staging_env(ctx.staging.path(), || {
        Bootstrapper::new(
            FakePlatform,
            PayloadSource::Embedded { binary, marker },
            Vec::new(),
        )
        .run()
        .unwrap_err()
    });

    assert!(matches!(err, SetupError::Archive(_)));
    assert!(err.to_string().to_lowercase().contains("archive"));
    // Nothing was staged: the failure happened before any extraction.
    assert!(ctx.staging_files().is_empty());
}

#[test]
fn test_payload_range_beyond_file_is_rejected() {
    let ctx = TestContext::new();
    let (binary, _) = ctx.fake_binary(b"short payload");
    let marker = BundleMarker { offset: 512, length: 1 << 20 };

    let err = Bootstrapper::new(
        FakePlatform,
        PayloadSource::Embedded { binary, marker },
        Vec::new(),
    )
    .run()
    .unwrap_err();

    assert!(matches!(err, SetupError::PayloadOutOfBounds { offset: 512, .. }));
}

#[test]
fn test_archive_without_updater_entry_is_reported() {
    let ctx = TestContext::new();

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("pkg/app.nuspec", SimpleFileOptions::default())
        .unwrap();
    writer
        .write_all(b"<package><metadata><id>demo</id></metadata></package>")
        .unwrap();
    let zip_bytes = writer.finish().unwrap().into_inner();

    let (binary, marker) = ctx.fake_binary(&zip_bytes);
    let err = with_staging_env(ctx.staging.path(), || {
        Bootstrapper::new(
            FakePlatform,
            PayloadSource::Embedded { binary, marker },
            Vec::new(),
        )
        .run()
        .unwrap_err()
    });

    assert!(matches!(err, SetupError::MissingUpdater(_)));
    assert!(err.to_string().contains("missing a critical binary"));
    assert!(ctx.staging_files().is_empty());
}

#[test]
fn test_resolve_without_marker_or_args_finds_nothing() {
    // This test binary was never patched by the packaging tool.
    let exe = std::env::current_exe().unwrap();
    assert_eq!(PayloadSource::resolve(&exe, &[]), None);
}

#[cfg(debug_assertions)]
#[test]
fn test_resolve_debug_fallback_accepts_single_existing_file() {
    let ctx = TestContext::new();
    let archive = ctx.scratch.path().join("debug.pkg");
    std::fs::write(&archive, b"bytes").unwrap();
    let exe = std::env::current_exe().unwrap();

    let source =
        PayloadSource::resolve(&exe, &[OsString::from(&archive)]).expect("fallback should apply");
    assert_eq!(source, PayloadSource::External { path: archive.clone() });
    assert_eq!(source.payload_offset(), 0);
    assert_eq!(source.source_binary(), archive);

    // Two arguments, or a missing file, do not trigger the fallback.
    let missing = ctx.scratch.path().join("missing.pkg");
    assert_eq!(PayloadSource::resolve(&exe, &[OsString::from(&missing)]), None);
    assert_eq!(
        PayloadSource::resolve(
            &exe,
            &[OsString::from(&archive), OsString::from("second")]
        ),
        None
    );
}

#[cfg(unix)]
#[test]
fn test_external_source_runs_whole_file_as_archive() {
    let ctx = TestContext::new();
    let out_path = ctx.scratch.path().join("external-args.txt");
    let zip_bytes = ctx.updater_zip("#!/bin/sh\nprintf '%s\\n' \"$@\" > \"$5\"\nexit 0\n");
    let archive_path = ctx.scratch.path().join("debug.pkg");
    std::fs::write(&archive_path, &zip_bytes).unwrap();

    let source = PayloadSource::External { path: archive_path.clone() };
    let forwarded = vec![OsString::from(&out_path)];

    with_staging_env(ctx.staging.path(), || {
        Bootstrapper::new(FakePlatform, source, forwarded).run().unwrap();
    });

    let observed = std::fs::read_to_string(&out_path).unwrap();
    let lines: Vec<&str> = observed.lines().collect();
    // A file-backed archive reports offset 0 and its own path as source.
    assert_eq!(
        lines,
        [
            "--setup",
            archive_path.to_str().unwrap(),
            "--setupOffset",
            "0",
            out_path.to_str().unwrap(),
        ]
    );
    assert!(ctx.staging_files().is_empty());
}
