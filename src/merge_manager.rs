//! Merge Manager
//!
//! Turns component identifiers into [`Mergeable`] units and commits them to
//! an archive, enforcing that every entry path is written at most once per
//! run.
//!
//! # Commit protocol
//!
//! 1. The unit writes itself into an in-memory [`EntryBuffer`]
//! 2. Every staged path is checked against the [`WrittenEntries`] set
//! 3. Only if no path is rejected are the entries written to the real sink
//!
//! A unit is therefore committed all-or-nothing, and archive order is the
//! order units are merged, then the order each unit emits its entries.
//!
//! # Collisions
//!
//! | Situation                                   | Result              |
//! |---------------------------------------------|---------------------|
//! | path new                                    | written             |
//! | path taken, unit `shared`                   | skipped, logged     |
//! | path taken, `SkipIdentical`, same bytes     | skipped, logged     |
//! | anything else                               | `DuplicateEntry`    |

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

use crate::archive::{ArchiveSink, EntryBuffer};
use crate::error::{CompileError, Result};
use crate::identifier::ComponentId;
use crate::mergeable::{Mergeable, PendingEntry};
use crate::path_resolver::{PathResolver, ResolvedPath};
use crate::search_path::ArtifactSearchPath;

/// What to do when a unit writes a path that is already in the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Any collision fails the run
    #[default]
    Reject,
    /// Byte-identical content is skipped, differing content fails the run
    SkipIdentical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WrittenEntry {
    writer: String,
    digest: [u8; 32],
}

/// Entry paths already written in the current run.
#[derive(Debug, Clone, Default)]
pub struct WrittenEntries {
    by_path: HashMap<String, WrittenEntry>,
    order: Vec<String>,
}

impl WrittenEntries {
    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Paths in write order
    pub fn paths(&self) -> &[String] {
        &self.order
    }

    /// Label of the unit that wrote `path`
    pub fn writer_of(&self, path: &str) -> Option<&str> {
        self.by_path.get(path).map(|e| e.writer.as_str())
    }

    fn get(&self, path: &str) -> Option<&WrittenEntry> {
        self.by_path.get(path)
    }

    fn record(&mut self, path: String, writer: &str, digest: [u8; 32]) {
        self.by_path.insert(
            path.clone(),
            WrittenEntry {
                writer: writer.to_string(),
                digest,
            },
        );
        self.order.push(path);
    }

    pub fn clear(&mut self) {
        self.by_path.clear();
        self.order.clear();
    }
}

/// Result of committing one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub origin: String,
    /// Paths written, in order
    pub written: Vec<String>,
    /// Paths left to their first writer
    pub skipped: Vec<String>,
}

pub struct MergeManager {
    search_path: ArtifactSearchPath,
    resolver: PathResolver,
    policy: DuplicatePolicy,
    written: WrittenEntries,
}

impl MergeManager {
    pub fn new(search_path: ArtifactSearchPath) -> Self {
        Self {
            search_path,
            resolver: PathResolver::default(),
            policy: DuplicatePolicy::default(),
            written: WrittenEntries::default(),
        }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn search_path(&self) -> &ArtifactSearchPath {
        &self.search_path
    }

    pub fn written_entries(&self) -> &WrittenEntries {
        &self.written
    }

    /// Forget every written path. Called at the start of each run.
    pub fn reset(&mut self) {
        self.written.clear();
    }

    /// Archive directory of a component, see [`PathResolver`].
    pub fn get_package_path_from_class_name(&self, identifier: &str) -> Result<ResolvedPath> {
        self.resolver.resolve(identifier)
    }

    /// Locate a component on the search path and build its unit.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` if `identifier` is malformed
    /// - `ComponentNotFound` if neither a class nor a resource directory
    ///   exists at the resolved location
    pub fn get_mergeable_from_component(&self, identifier: &str) -> Result<Mergeable> {
        let id = ComponentId::parse(identifier)?;
        self.resolve_component(&id)
    }

    /// Same as [`Self::get_mergeable_from_component`] for a parsed identifier.
    ///
    /// Read-only, so it can run concurrently for several components.
    pub fn resolve_component(&self, id: &ComponentId) -> Result<Mergeable> {
        let package = self.resolver.resolve_id(id);
        let simple = id.simple_name();
        let class_name = format!("{simple}.class");
        let class_entry = package.entry(&class_name);

        if let Some(located) = self.search_path.find_file(&class_entry) {
            let nested_prefix = format!("{simple}$");
            let mut nested = Vec::new();
            let mut resources = Vec::new();

            for (name, source) in self.search_path.list_dir(located.root, package.as_str())? {
                if name == class_name {
                    continue;
                }
                if name.starts_with(&nested_prefix) && name.ends_with(".class") {
                    nested.push(PendingEntry::new(package.entry(&name), source));
                } else if file_stem(&name) == simple && !name.ends_with(".class") {
                    resources.push(PendingEntry::new(package.entry(&name), source));
                }
            }

            debug!(
                component = %id,
                class = %class_entry,
                nested = nested.len(),
                resources = resources.len(),
                "resolved class artifact"
            );
            return Ok(Mergeable::ClassArtifact {
                component: id.clone(),
                class: PendingEntry::new(class_entry, located.source),
                nested,
                resources,
            });
        }

        let tree_dir = package.entry(simple);
        if let Some(files) = self.search_path.find_tree(&tree_dir)? {
            debug!(component = %id, dir = %tree_dir, files = files.len(), "resolved resource tree");
            return Mergeable::tree(id.as_str(), &tree_dir, files, false);
        }

        Err(CompileError::ComponentNotFound {
            component: id.to_string(),
            searched: format!(
                "{class_entry} or {tree_dir}/ in {} search root(s)",
                self.search_path.roots().len()
            ),
        })
    }

    /// Resolve a component and commit it to `sink`.
    pub fn merge<S: ArchiveSink + ?Sized>(
        &mut self,
        identifier: &str,
        sink: &mut S,
    ) -> Result<MergeOutcome> {
        let mergeable = self.get_mergeable_from_component(identifier)?;
        self.merge_mergeable(&mergeable, sink)
    }

    /// Commit an already built unit to `sink`.
    ///
    /// # Errors
    ///
    /// `DuplicateEntry` on a rejected collision (nothing of the unit is
    /// written), `SourceNotFound` if a source vanished, and any sink error.
    pub fn merge_mergeable<S: ArchiveSink + ?Sized>(
        &mut self,
        mergeable: &Mergeable,
        sink: &mut S,
    ) -> Result<MergeOutcome> {
        let origin = mergeable.origin().to_string();

        let mut staged = EntryBuffer::new();
        mergeable.merge(&mut staged)?;

        let mut commit = Vec::with_capacity(staged.len());
        let mut skipped = Vec::new();
        for (path, data) in staged.into_entries() {
            let digest: [u8; 32] = Sha256::digest(&data).into();

            if let Some(existing) = self.written.get(&path) {
                if mergeable.is_shared() {
                    warn!(
                        path = %path,
                        origin = %origin,
                        first_writer = %existing.writer,
                        "shared entry already present, keeping first writer"
                    );
                    skipped.push(path);
                    continue;
                }
                if self.policy == DuplicatePolicy::SkipIdentical && existing.digest == digest {
                    warn!(
                        path = %path,
                        origin = %origin,
                        first_writer = %existing.writer,
                        "identical entry already present, skipping"
                    );
                    skipped.push(path);
                    continue;
                }
                return Err(CompileError::DuplicateEntry {
                    path,
                    origin,
                    first_writer: existing.writer.clone(),
                });
            }
            commit.push((path, data, digest));
        }

        let mut written = Vec::with_capacity(commit.len());
        for (path, data, digest) in commit {
            sink.put_entry(&path, &data)?;
            self.written.record(path.clone(), &origin, digest);
            written.push(path);
        }

        info!(
            origin = %origin,
            kind = %mergeable.kind(),
            written = written.len(),
            skipped = skipped.len(),
            "merged"
        );
        Ok(MergeOutcome {
            origin,
            written,
            skipped,
        })
    }
}

fn file_stem(name: &str) -> &str {
    name.split_once('.').map_or(name, |(stem, _)| stem)
}
