//! Artifact search path
//!
//! Ordered list of roots where compiled components and their resources are
//! looked up. A root is either a directory or a zip/jar archive; the first
//! root containing a path wins. Archive roots are indexed once when the
//! search path is built, so lookups afterwards only touch the filesystem for
//! directory roots.
//!
//! Lookups are read-only and never retry: a missing artifact is `None`, and
//! the caller decides which error that becomes.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::archive::{open_archive, read_entry};
use crate::error::{CompileError, Result};

/// Where the bytes of one archive entry come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
    /// Plain file on disk
    File(PathBuf),
    /// Member of a zip/jar archive
    ArchiveMember { archive: PathBuf, member: String },
    /// Bytes produced by the compiler itself
    Bytes(Vec<u8>),
}

impl EntrySource {
    /// Read the content. `origin` names the unit for error reporting.
    ///
    /// # Errors
    ///
    /// `SourceNotFound` if the file or archive member does not exist.
    pub fn read(&self, origin: &str) -> Result<Vec<u8>> {
        match self {
            Self::File(path) => fs::read(path).map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    CompileError::SourceNotFound {
                        origin: origin.to_string(),
                        path: path.clone(),
                    }
                } else {
                    CompileError::io(path, e)
                }
            }),
            Self::ArchiveMember { archive, member } => {
                if !archive.is_file() {
                    return Err(CompileError::SourceNotFound {
                        origin: origin.to_string(),
                        path: archive.clone(),
                    });
                }
                read_entry(archive, member).map_err(|e| match e {
                    CompileError::SourceNotFound { path, .. } => CompileError::SourceNotFound {
                        origin: origin.to_string(),
                        path,
                    },
                    other => other,
                })
            }
            Self::Bytes(data) => Ok(data.clone()),
        }
    }

    /// Human readable location, for logs
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::ArchiveMember { archive, member } => {
                format!("{}!{}", archive.display(), member)
            }
            Self::Bytes(data) => format!("<generated, {} bytes>", data.len()),
        }
    }
}

/// One entry of the search path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRoot {
    Directory(PathBuf),
    Archive {
        path: PathBuf,
        entries: BTreeSet<String>,
    },
}

impl SearchRoot {
    /// Open a directory or a `.jar`/`.zip` archive.
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        if path.is_file() && is_archive_path(path) {
            let mut archive = open_archive(path)?;
            let mut entries = BTreeSet::new();
            for index in 0..archive.len() {
                let entry = archive
                    .by_index(index)
                    .map_err(|e| CompileError::archive(path, e))?;
                if !entry.is_dir() {
                    entries.insert(entry.name().to_string());
                }
            }
            debug!(path = %path.display(), entries = entries.len(), "indexed archive root");
            return Ok(Self::Archive {
                path: path.to_path_buf(),
                entries,
            });
        }
        Err(CompileError::config(format!(
            "search path entry {} is neither a directory nor a .jar/.zip archive",
            path.display()
        )))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) => path,
            Self::Archive { path, .. } => path,
        }
    }

    fn source_of(&self, entry: &str) -> Option<EntrySource> {
        match self {
            Self::Directory(root) => {
                let file = join_entry(root, entry);
                file.is_file().then_some(EntrySource::File(file))
            }
            Self::Archive { path, entries } => {
                entries
                    .contains(entry)
                    .then(|| EntrySource::ArchiveMember {
                        archive: path.clone(),
                        member: entry.to_string(),
                    })
            }
        }
    }

    /// Files below `dir` (`""` for the whole root), sorted by path relative
    /// to `dir`. With `recursive == false` only direct children are listed.
    pub fn files_under(&self, dir: &str, recursive: bool) -> Result<Vec<(String, EntrySource)>> {
        match self {
            Self::Directory(root) => {
                let base = join_entry(root, dir);
                if !base.is_dir() {
                    return Ok(Vec::new());
                }
                let files = if recursive {
                    walk_files(&base)
                } else {
                    list_files(&base)
                }
                .map_err(|e| CompileError::io(&base, e))?;
                Ok(files
                    .into_iter()
                    .map(|(rel, path)| (rel, EntrySource::File(path)))
                    .collect())
            }
            Self::Archive { path, entries } => {
                let prefix = if dir.is_empty() {
                    String::new()
                } else {
                    format!("{dir}/")
                };
                Ok(entries
                    .iter()
                    .filter_map(|name| name.strip_prefix(prefix.as_str()).map(|rel| (name, rel)))
                    .filter(|(_, rel)| recursive || !rel.contains('/'))
                    .map(|(name, rel)| {
                        (
                            rel.to_string(),
                            EntrySource::ArchiveMember {
                                archive: path.clone(),
                                member: name.clone(),
                            },
                        )
                    })
                    .collect())
            }
        }
    }
}

/// A file found on the search path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// Index of the root it was found in
    pub root: usize,
    pub source: EntrySource,
}

/// Ordered collection of search roots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSearchPath {
    roots: Vec<SearchRoot>,
}

impl ArtifactSearchPath {
    /// Open every path in order.
    pub fn new<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = paths
            .into_iter()
            .map(|p| SearchRoot::open(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { roots })
    }

    pub fn roots(&self) -> &[SearchRoot] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// First root containing the file `entry` (archive-relative path)
    pub fn find_file(&self, entry: &str) -> Option<Located> {
        self.roots.iter().enumerate().find_map(|(root, r)| {
            r.source_of(entry).map(|source| Located { root, source })
        })
    }

    /// Direct children files of `dir` inside one root
    pub fn list_dir(&self, root: usize, dir: &str) -> Result<Vec<(String, EntrySource)>> {
        match self.roots.get(root) {
            Some(r) => r.files_under(dir, false),
            None => Ok(Vec::new()),
        }
    }

    /// All files below `dir` in the first root that has any.
    pub fn find_tree(&self, dir: &str) -> Result<Option<Vec<(String, EntrySource)>>> {
        for root in &self.roots {
            let files = root.files_under(dir, true)?;
            if !files.is_empty() {
                return Ok(Some(files));
            }
        }
        Ok(None)
    }
}

fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"))
}

/// Map a slash-separated entry path onto a host path below `root`
pub(crate) fn join_entry(root: &Path, entry: &str) -> PathBuf {
    entry
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// File name as an entry segment; names that are not UTF-8 cannot be stored
fn file_name_utf8(path: &Path) -> io::Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("file name is not valid UTF-8: {}", path.display()),
            )
        })
}

fn list_files(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push((file_name_utf8(&path)?, path));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Every file below `dir`, keyed by its slash-separated relative path.
pub(crate) fn walk_files(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    let mut pending = vec![(String::new(), dir.to_path_buf())];

    while let Some((prefix, current)) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            let name = file_name_utf8(&path)?;
            let rel = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            if path.is_dir() {
                pending.push((rel, path));
            } else if path.is_file() {
                files.push((rel, path));
            }
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}
