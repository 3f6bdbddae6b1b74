//! Output archive handling
//!
//! The installer is a zip container. Entries are written through the
//! [`ArchiveSink`] trait so that units can be staged in memory
//! ([`EntryBuffer`]) before they reach the real [`OutputArchive`].
//!
//! # Lifecycle
//!
//! - `OutputArchive::create` opens a temporary file next to the output path
//!   (a stale file at the output path is removed first)
//! - `put_entry` appends entries; an entry is never rewritten
//! - `finalize` finishes the zip and atomically moves it to the output path
//! - `discard` or dropping the archive deletes the temporary file, so a
//!   failed run never leaves an openable archive at the output path

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{CompileError, Result};

/// Anything archive entries can be written to.
pub trait ArchiveSink {
    /// Append one entry. Implementations may reject invalid paths.
    fn put_entry(&mut self, path: &str, data: &[u8]) -> Result<()>;
}

/// Check that `path` is a usable archive entry path.
///
/// Entry paths are relative, slash-separated, non-empty, with no `.`/`..`
/// or empty segment and no trailing slash (directories are implicit).
pub fn validate_entry_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(CompileError::invalid_entry_path(path, "entry path is empty"));
    }
    if path.contains('\\') {
        return Err(CompileError::invalid_entry_path(path, "backslash separator"));
    }
    if path.contains('\0') {
        return Err(CompileError::invalid_entry_path(path, "NUL character"));
    }
    if path.starts_with('/') {
        return Err(CompileError::invalid_entry_path(path, "absolute path"));
    }
    if path.ends_with('/') {
        return Err(CompileError::invalid_entry_path(path, "directory entry"));
    }
    if path.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        return Err(CompileError::invalid_entry_path(
            path,
            "empty or relative segment",
        ));
    }
    Ok(())
}

/// In-memory sink, used to stage a unit before committing it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntryBuffer {
    entries: Vec<(String, Vec<u8>)>,
}

impl EntryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, data)| data.as_slice())
    }

    pub fn into_entries(self) -> Vec<(String, Vec<u8>)> {
        self.entries
    }
}

impl ArchiveSink for EntryBuffer {
    fn put_entry(&mut self, path: &str, data: &[u8]) -> Result<()> {
        validate_entry_path(path)?;
        self.entries.push((path.to_string(), data.to_vec()));
        Ok(())
    }
}

/// Zip archive being built for one compilation run.
pub struct OutputArchive {
    target: PathBuf,
    writer: Option<ZipWriter<NamedTempFile>>,
    entries: Vec<String>,
}

impl OutputArchive {
    /// Open a new archive that will land at `target` once finalized.
    pub fn create(target: &Path) -> Result<Self> {
        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| CompileError::io(&parent, e))?;

        remove_stale_output(target)?;

        let temp = tempfile::Builder::new()
            .prefix(".panelpack-")
            .suffix(".part")
            .tempfile_in(&parent)
            .map_err(|e| CompileError::io(&parent, e))?;
        debug!(
            target = %target.display(),
            staging = %temp.path().display(),
            "opened output archive"
        );

        Ok(Self {
            target: target.to_path_buf(),
            writer: Some(ZipWriter::new(temp)),
            entries: Vec::new(),
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Entry paths written so far, in write order
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Finish the zip and move it to the output path.
    ///
    /// Returns the entry paths in write order.
    pub fn finalize(mut self) -> Result<Vec<String>> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| CompileError::config("output archive is already closed"))?;

        let temp = writer
            .finish()
            .map_err(|e| CompileError::archive(&self.target, e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| CompileError::io(&self.target, e))?;
        temp.persist(&self.target)
            .map_err(|e| CompileError::io(&self.target, e.error))?;

        info!(
            path = %self.target.display(),
            entries = self.entries.len(),
            "output archive finalized"
        );
        Ok(std::mem::take(&mut self.entries))
    }

    /// Drop the partial archive without producing output.
    pub fn discard(mut self) {
        if self.writer.take().is_some() {
            warn!(
                path = %self.target.display(),
                entries = self.entries.len(),
                "discarded partial output archive"
            );
        }
    }
}

impl ArchiveSink for OutputArchive {
    fn put_entry(&mut self, path: &str, data: &[u8]) -> Result<()> {
        validate_entry_path(path)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CompileError::config("output archive is already closed"))?;

        writer
            .start_file(path, entry_options())
            .map_err(|e| CompileError::archive(&self.target, e))?;
        writer
            .write_all(data)
            .map_err(|e| CompileError::io(&self.target, e))?;

        self.entries.push(path.to_string());
        Ok(())
    }
}

impl Drop for OutputArchive {
    fn drop(&mut self) {
        // NamedTempFile deletes itself; only note that it happened
        if self.writer.is_some() {
            debug!(path = %self.target.display(), "unfinished output archive dropped");
        }
    }
}

/// Fixed metadata so identical inputs give identical archives
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

/// Delete a file left at `target` by an earlier run.
pub fn remove_stale_output(target: &Path) -> Result<()> {
    if target.is_file() {
        debug!(path = %target.display(), "removing stale output archive");
        fs::remove_file(target).map_err(|e| CompileError::io(target, e))?;
    }
    Ok(())
}

/// List the file entry paths of a zip archive, in archive order.
pub fn list_entries(path: &Path) -> Result<Vec<String>> {
    let mut archive = open_archive(path)?;
    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| CompileError::archive(path, e))?;
        if !entry.is_dir() {
            names.push(entry.name().to_string());
        }
    }
    Ok(names)
}

/// Read one member of a zip archive.
///
/// # Errors
///
/// `SourceNotFound` if the archive has no such member.
pub fn read_entry(path: &Path, member: &str) -> Result<Vec<u8>> {
    let mut archive = open_archive(path)?;
    let mut entry = match archive.by_name(member) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(CompileError::SourceNotFound {
                origin: member.to_string(),
                path: path.join(member),
            });
        }
        Err(e) => return Err(CompileError::archive(path, e)),
    };

    let mut data = Vec::new();
    entry
        .read_to_end(&mut data)
        .map_err(|e| CompileError::io(path, e))?;
    Ok(data)
}

pub(crate) fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| CompileError::io(path, e))?;
    ZipArchive::new(file).map_err(|e| CompileError::archive(path, e))
}
