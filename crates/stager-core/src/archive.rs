//! Update-bundle archive reading.
//!
//! The bundle is a standard zip container, read either from an in-memory
//! byte range (the mapped setup binary) or from a file on disk (debug
//! builds). Entries are enumerated eagerly once; lookups match by name
//! suffix because the packaging tool owns the internal layout and may nest
//! entries under prefixes this code never needs to know about.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::Path;

use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::manifest::Manifest;

/// Errors reading or extracting from the bundle archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The archive container could not be parsed.
    #[error("Unable to read archive: {0}")]
    Open(ZipError),

    /// A specific entry could not be decompressed.
    #[error("Unable to extract '{name}' from archive: {source}")]
    Extract { name: String, source: ZipError },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Metadata for one archive entry, projected out of the central directory.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Stored entry name, as written by the packaging tool.
    pub name: String,
    /// Whether the entry is a directory record.
    pub is_dir: bool,
    /// Size of the entry's compressed data.
    pub compressed_size: u64,
    /// Size of the entry once decompressed.
    pub uncompressed_size: u64,
    /// Position in the central directory, used to reopen the entry.
    pub index: usize,
    unix_mode: Option<u32>,
}

/// An opened bundle archive with its eagerly-built entry table and, when
/// present and well-formed, the parsed package manifest.
pub struct Archive<R: Read + Seek> {
    zip: ZipArchive<R>,
    entries: Vec<ArchiveEntry>,
    manifest: Option<Manifest>,
    compressed_size: u64,
}

impl<R: Read + Seek> std::fmt::Debug for Archive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.entries.len())
            .field("compressed_size", &self.compressed_size)
            .field("has_manifest", &self.manifest.is_some())
            .finish()
    }
}

impl<'a> Archive<Cursor<&'a [u8]>> {
    /// Open an archive held in memory, typically a range of the mapped
    /// setup binary.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, ArchiveError> {
        Self::open(Cursor::new(bytes), bytes.len() as u64)
    }
}

impl Archive<BufReader<File>> {
    /// Open an archive file on disk.
    pub fn from_file(path: &Path) -> Result<Self, ArchiveError> {
        let file = File::open(path)?;
        let on_disk = file.metadata()?.len();
        Self::open(BufReader::new(file), on_disk)
    }
}

impl<R: Read + Seek> Archive<R> {
    fn open(reader: R, compressed_size: u64) -> Result<Self, ArchiveError> {
        let mut zip = ZipArchive::new(reader).map_err(ArchiveError::Open)?;

        let mut entries = Vec::with_capacity(zip.len());
        for index in 0..zip.len() {
            // An entry with an unreadable header is skipped, not fatal;
            // the required entries are looked up by name afterwards.
            let Ok(file) = zip.by_index_raw(index) else {
                tracing::debug!(index, "skipping unreadable archive entry");
                continue;
            };
            entries.push(ArchiveEntry {
                name: file.name().to_string(),
                is_dir: file.is_dir(),
                compressed_size: file.compressed_size(),
                uncompressed_size: file.size(),
                index,
                unix_mode: file.unix_mode(),
            });
        }

        let manifest = load_manifest(&mut zip, &entries);
        Ok(Self { zip, entries, manifest, compressed_size })
    }

    /// All enumerated entries, in central-directory order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// First non-directory entry whose stored name ends with `suffix`.
    pub fn find_entry(&self, suffix: &str) -> Option<&ArchiveEntry> {
        self.entries
            .iter()
            .find(|e| !e.is_dir && e.name.ends_with(suffix))
    }

    /// Stream one entry's decompressed contents into a new file at `dest`.
    ///
    /// The unix executable bit recorded in the archive is restored. On
    /// failure the destination may hold partial data; the caller owns
    /// deleting it (the bootstrapper's cleanup does so unconditionally).
    pub fn extract_to_file(&mut self, entry: &ArchiveEntry, dest: &Path) -> Result<u64, ArchiveError> {
        let mut file = self
            .zip
            .by_index(entry.index)
            .map_err(|source| ArchiveError::Extract { name: entry.name.clone(), source })?;

        let mut out = File::create(dest)?;
        let written = io::copy(&mut file, &mut out)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dest, std::fs::Permissions::from_mode(mode))?;
        }

        tracing::debug!(name = %entry.name, dest = %dest.display(), written, "extracted entry");
        Ok(written)
    }

    /// Read one entry fully into memory.
    pub fn read_entry(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>, ArchiveError> {
        let mut file = self
            .zip
            .by_index(entry.index)
            .map_err(|source| ArchiveError::Extract { name: entry.name.clone(), source })?;
        let mut buf = Vec::with_capacity(entry.uncompressed_size as usize);
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// The container's own size on disk (or in memory).
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Sum of the decompressed sizes of all file entries.
    pub fn uncompressed_size(&self) -> u64 {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.uncompressed_size)
            .sum()
    }

    /// The parsed package manifest, if the archive carried a well-formed one.
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Minimum OS version the package declares, if any.
    pub fn minimum_os_version(&self) -> Option<&str> {
        self.manifest.as_ref()?.minimum_os_version.as_deref()
    }

    /// CPU architecture the package declares, if any.
    pub fn machine_architecture(&self) -> Option<&str> {
        self.manifest.as_ref()?.machine_architecture.as_deref()
    }
}

/// Best-effort manifest load: a missing entry, unreadable bytes, or invalid
/// XML all degrade to "no manifest" so metadata problems never block an
/// otherwise-valid install.
fn load_manifest<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    entries: &[ArchiveEntry],
) -> Option<Manifest> {
    let entry = entries
        .iter()
        .find(|e| !e.is_dir && e.name.ends_with(crate::MANIFEST_SUFFIX))?;

    let mut file = match zip.by_index(entry.index) {
        Ok(file) => file,
        Err(err) => {
            tracing::debug!(name = %entry.name, %err, "unable to open manifest entry");
            return None;
        }
    };

    let mut xml = String::new();
    if let Err(err) = file.read_to_string(&mut xml) {
        tracing::debug!(name = %entry.name, %err, "unable to read manifest entry");
        return None;
    }

    match Manifest::parse(&xml) {
        Ok(manifest) => Some(manifest),
        Err(err) => {
            tracing::debug!(name = %entry.name, %err, "ignoring unparseable manifest");
            None
        }
    }
}
