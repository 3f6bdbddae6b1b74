//! Mergeable units
//!
//! A [`Mergeable`] is one resolved piece of content that knows how to write
//! itself into an archive. The set of kinds is closed:
//!
//! - `ClassArtifact`: a component class, its nested classes and the
//!   resources colocated with it
//! - `ResourceTree`: every file below a directory (or inside a library
//!   archive), written under a prefix
//! - `SingleFile`: one source written at one exact entry path
//!
//! A unit never deduplicates against other units; that is the merge
//! manager's job. It does refuse to write the same path twice itself.

use std::collections::HashSet;
use std::path::Path;

use strum::Display;
use tracing::trace;

use crate::archive::{validate_entry_path, ArchiveSink};
use crate::error::{CompileError, Result};
use crate::identifier::ComponentId;
use crate::search_path::{walk_files, EntrySource, SearchRoot};

/// Manifest of a library archive, never copied into the installer
const LIBRARY_MANIFEST: &str = "META-INF/MANIFEST.MF";

/// Signature files of a signed library; they would not match the installer
const SIGNATURE_EXTENSIONS: [&str; 4] = ["SF", "RSA", "DSA", "EC"];

/// One (source → entry path) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub path: String,
    pub source: EntrySource,
}

impl PendingEntry {
    pub fn new(path: impl Into<String>, source: EntrySource) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum MergeableKind {
    ClassArtifact,
    ResourceTree,
    SingleFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mergeable {
    ClassArtifact {
        component: ComponentId,
        class: PendingEntry,
        /// `Name$*.class`, sorted
        nested: Vec<PendingEntry>,
        /// Same directory, same file stem, sorted
        resources: Vec<PendingEntry>,
    },
    ResourceTree {
        origin: String,
        entries: Vec<PendingEntry>,
        shared: bool,
    },
    SingleFile {
        origin: String,
        entry: PendingEntry,
        shared: bool,
    },
}

impl Mergeable {
    /// A file from disk written at exactly `target`.
    ///
    /// # Errors
    ///
    /// `SourceNotFound` if `source` is not a file, `InvalidEntryPath` if
    /// `target` is not a valid entry path.
    pub fn single_file(
        origin: impl Into<String>,
        source: &Path,
        target: &str,
        shared: bool,
    ) -> Result<Self> {
        let origin = origin.into();
        validate_entry_path(target)?;
        if !source.is_file() {
            return Err(CompileError::SourceNotFound {
                origin,
                path: source.to_path_buf(),
            });
        }
        Ok(Self::SingleFile {
            origin,
            entry: PendingEntry::new(target, EntrySource::File(source.to_path_buf())),
            shared,
        })
    }

    /// Bytes produced by the compiler, written at `target`.
    pub fn generated(origin: impl Into<String>, target: &str, data: Vec<u8>) -> Result<Self> {
        validate_entry_path(target)?;
        Ok(Self::SingleFile {
            origin: origin.into(),
            entry: PendingEntry::new(target, EntrySource::Bytes(data)),
            shared: false,
        })
    }

    /// Every file below `dir` on disk, written under `prefix`.
    pub fn resource_dir(
        origin: impl Into<String>,
        dir: &Path,
        prefix: &str,
        shared: bool,
    ) -> Result<Self> {
        let origin = origin.into();
        if !dir.is_dir() {
            return Err(CompileError::SourceNotFound {
                origin,
                path: dir.to_path_buf(),
            });
        }
        let files = walk_files(dir).map_err(|e| CompileError::io(dir, e))?;
        let files = files
            .into_iter()
            .map(|(rel, path)| (rel, EntrySource::File(path)))
            .collect();
        Self::tree(origin, prefix, files, shared)
    }

    /// Every file entry of a jar/zip library at its own path.
    pub fn library(origin: impl Into<String>, archive: &Path, shared: bool) -> Result<Self> {
        let origin = origin.into();
        if !archive.is_file() {
            return Err(CompileError::SourceNotFound {
                origin,
                path: archive.to_path_buf(),
            });
        }
        let files = SearchRoot::open(archive)?
            .files_under("", true)?
            .into_iter()
            .filter(|(rel, _)| !is_library_metadata(rel))
            .collect();
        Self::tree(origin, "", files, shared)
    }

    /// Tree from already located files, keyed by path relative to `prefix`.
    pub fn tree(
        origin: impl Into<String>,
        prefix: &str,
        files: Vec<(String, EntrySource)>,
        shared: bool,
    ) -> Result<Self> {
        let prefix = prefix.trim_end_matches('/');
        let entries = files
            .into_iter()
            .map(|(rel, source)| {
                let path = if prefix.is_empty() {
                    rel
                } else {
                    format!("{prefix}/{rel}")
                };
                validate_entry_path(&path)?;
                Ok(PendingEntry::new(path, source))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::ResourceTree {
            origin: origin.into(),
            entries,
            shared,
        })
    }

    pub fn kind(&self) -> MergeableKind {
        match self {
            Self::ClassArtifact { .. } => MergeableKind::ClassArtifact,
            Self::ResourceTree { .. } => MergeableKind::ResourceTree,
            Self::SingleFile { .. } => MergeableKind::SingleFile,
        }
    }

    /// Label used in logs and errors
    pub fn origin(&self) -> &str {
        match self {
            Self::ClassArtifact { component, .. } => component.as_str(),
            Self::ResourceTree { origin, .. } | Self::SingleFile { origin, .. } => origin,
        }
    }

    /// Shared units tolerate paths that are already in the archive.
    pub fn is_shared(&self) -> bool {
        match self {
            Self::ClassArtifact { .. } => false,
            Self::ResourceTree { shared, .. } | Self::SingleFile { shared, .. } => *shared,
        }
    }

    /// Entries in the order `merge` writes them
    pub fn entries(&self) -> Vec<&PendingEntry> {
        match self {
            Self::ClassArtifact {
                class,
                nested,
                resources,
                ..
            } => std::iter::once(class)
                .chain(nested.iter())
                .chain(resources.iter())
                .collect(),
            Self::ResourceTree { entries, .. } => entries.iter().collect(),
            Self::SingleFile { entry, .. } => vec![entry],
        }
    }

    /// Write every entry to `sink`, returning how many were written.
    pub fn merge<S: ArchiveSink + ?Sized>(&self, sink: &mut S) -> Result<usize> {
        let origin = self.origin();
        let mut seen = HashSet::new();
        let mut written = 0;

        for entry in self.entries() {
            if !seen.insert(entry.path.as_str()) {
                return Err(CompileError::DuplicateEntry {
                    path: entry.path.clone(),
                    origin: origin.to_string(),
                    first_writer: origin.to_string(),
                });
            }
            let data = entry.source.read(origin)?;
            trace!(
                origin,
                path = %entry.path,
                source = %entry.source.describe(),
                bytes = data.len(),
                "writing entry"
            );
            sink.put_entry(&entry.path, &data)?;
            written += 1;
        }

        Ok(written)
    }
}

/// Library entries that describe the library jar itself
fn is_library_metadata(path: &str) -> bool {
    if path.eq_ignore_ascii_case(LIBRARY_MANIFEST) {
        return true;
    }
    let Some((dir, name)) = path.rsplit_once('/') else {
        return false;
    };
    if !dir.eq_ignore_ascii_case("META-INF") {
        return false;
    }
    name.rsplit_once('.').is_some_and(|(_, ext)| {
        SIGNATURE_EXTENSIONS
            .iter()
            .any(|sig| ext.eq_ignore_ascii_case(sig))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::EntryBuffer;
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn test_single_file_writes_exact_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let icon = dir.path().join("icon.png");
        fs::write(&icon, b"png").expect("write");

        let unit = Mergeable::single_file("image", &icon, "img/JFrameIcon.png", false)
            .expect("mergeable");
        let mut sink = EntryBuffer::new();
        assert_eq!(unit.merge(&mut sink).expect("merge"), 1);
        assert_eq!(sink.get("img/JFrameIcon.png"), Some(&b"png"[..]));
    }

    #[test]
    fn test_single_file_missing_source() {
        let err = Mergeable::single_file("image", Path::new("/nope.png"), "img/a.png", false)
            .unwrap_err();
        assert!(matches!(err, CompileError::SourceNotFound { .. }));
    }

    #[test]
    fn test_resource_dir_prefixes_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("sub")).expect("mkdir");
        fs::write(dir.path().join("a.txt"), b"a").expect("write");
        fs::write(dir.path().join("sub/b.txt"), b"b").expect("write");

        let unit = Mergeable::resource_dir("docs", dir.path(), "resources/docs", false)
            .expect("mergeable");
        assert_eq!(unit.kind(), MergeableKind::ResourceTree);

        let mut sink = EntryBuffer::new();
        unit.merge(&mut sink).expect("merge");
        assert_eq!(
            sink.paths().collect::<Vec<_>>(),
            vec!["resources/docs/a.txt", "resources/docs/sub/b.txt"]
        );
    }

    #[test]
    fn test_merge_reports_vanished_source() {
        let unit = Mergeable::SingleFile {
            origin: "gone".to_string(),
            entry: PendingEntry::new("x.txt", EntrySource::File(PathBuf::from("/no/such/file"))),
            shared: false,
        };
        let mut sink = EntryBuffer::new();
        assert!(matches!(
            unit.merge(&mut sink),
            Err(CompileError::SourceNotFound { .. })
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_repeated_path_inside_unit_is_rejected() {
        let unit = Mergeable::ResourceTree {
            origin: "twice".to_string(),
            entries: vec![
                PendingEntry::new("a.txt", EntrySource::Bytes(b"1".to_vec())),
                PendingEntry::new("a.txt", EntrySource::Bytes(b"2".to_vec())),
            ],
            shared: false,
        };
        let mut sink = EntryBuffer::new();
        assert!(matches!(
            unit.merge(&mut sink),
            Err(CompileError::DuplicateEntry { .. })
        ));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(MergeableKind::ClassArtifact.to_string(), "class-artifact");
        assert_eq!(MergeableKind::SingleFile.to_string(), "single-file");
    }

    #[test]
    fn test_library_skips_manifest_and_signatures() {
        use crate::archive::{ArchiveSink, OutputArchive};

        let dir = tempfile::tempdir().expect("tempdir");
        let jar = dir.path().join("signed.jar");
        let mut archive = OutputArchive::create(&jar).expect("create");
        for name in [
            "META-INF/MANIFEST.MF",
            "META-INF/SIGNER.SF",
            "META-INF/SIGNER.RSA",
            "META-INF/other.dsa",
            "META-INF/services/com.acme.Plugin",
            "com/acme/Util.class",
        ] {
            archive.put_entry(name, b"x").expect("put");
        }
        archive.finalize().expect("finalize");

        let unit = Mergeable::library("library:signed.jar", &jar, false).expect("library");
        let paths: Vec<&str> = unit.entries().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["META-INF/services/com.acme.Plugin", "com/acme/Util.class"]
        );
    }

    #[test]
    fn test_library_metadata_names() {
        assert!(is_library_metadata("META-INF/MANIFEST.MF"));
        assert!(is_library_metadata("meta-inf/KEY.ec"));
        assert!(!is_library_metadata("META-INF/maven/pom.xml"));
        assert!(!is_library_metadata("lib/META-INF/KEY.SF"));
        assert!(!is_library_metadata("KEY.SF"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resource_dir_with_non_utf8_name_fails() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.txt"), b"a").expect("write");
        fs::write(dir.path().join(OsStr::from_bytes(b"b\xff.txt")), b"b").expect("write");

        let err = Mergeable::resource_dir("docs", dir.path(), "resources/docs", false)
            .unwrap_err();
        assert!(matches!(err, CompileError::Io { .. }));
    }
}
