//! panelpack Library
//!
//! Merge-and-resolve engine of an installer compiler: reads an installation
//! descriptor, locates every component it names on an artifact search path
//! and merges their entries into a single zip archive, each entry path
//! exactly once.

pub mod archive;
pub mod bootstrap;
pub mod cli;
pub mod compile_state;
pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod identifier;
pub mod logging;
pub mod merge_manager;
pub mod mergeable;
pub mod path_resolver;
pub mod search_path;

// Re-export main types for convenience
pub use archive::{ArchiveSink, EntryBuffer, OutputArchive};
pub use compile_state::{CompileContext, CompileStage, CompileTransitionError};
pub use compiler::{CompileReport, Compiler};
pub use config::{CompilerData, CompilerOptions};
pub use descriptor::{DescriptorError, DescriptorReader, InstallDescriptor, JsonDescriptorReader};
pub use error::{CompileError, Result};
pub use identifier::ComponentId;
pub use merge_manager::{DuplicatePolicy, MergeManager, MergeOutcome, WrittenEntries};
pub use mergeable::{Mergeable, MergeableKind, PendingEntry};
pub use path_resolver::{resolve_package_path, PathResolver, ResolvedPath};
pub use search_path::{ArtifactSearchPath, EntrySource, SearchRoot};
