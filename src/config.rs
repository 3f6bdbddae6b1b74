//! Compiler configuration
//!
//! Two layers:
//!
//! - [`CompilerData`]: the immutable inputs of one run (descriptor, base
//!   directory, output path). Fixed when the compiler is built.
//! - [`CompilerOptions`]: tunables that can be saved to and loaded from a
//!   JSON file (search path, duplicate policy, default panel package,
//!   launcher class, parallel resolution).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};
use crate::identifier::ComponentId;
use crate::merge_manager::DuplicatePolicy;
use crate::path_resolver::{PathResolver, ResolvedPath, DEFAULT_PANEL_PACKAGE};

/// Class named as the archive's entry point unless configured otherwise
pub const DEFAULT_LAUNCHER: &str = "com.izforge.izpack.installer.Installer";

/// Search path used when none is configured, relative to the base directory
pub const DEFAULT_SEARCH_PATH: &str = "lib";

/// Inputs of one compilation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerData {
    descriptor: PathBuf,
    base_dir: PathBuf,
    output: PathBuf,
}

impl CompilerData {
    pub fn new(
        descriptor: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            descriptor: descriptor.into(),
            base_dir: base_dir.into(),
            output: output.into(),
        }
    }

    pub fn descriptor(&self) -> &Path {
        &self.descriptor
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Resolve a descriptor-relative path against the base directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Check that every location is usable.
    ///
    /// # Errors
    ///
    /// `Config` if the descriptor is not a file, the base directory is not a
    /// readable directory, or the output path is a directory.
    pub fn validate(&self) -> Result<()> {
        if !self.descriptor.is_file() {
            return Err(CompileError::config(format!(
                "descriptor {} is not a file",
                self.descriptor.display()
            )));
        }
        if !self.base_dir.is_dir() {
            return Err(CompileError::config(format!(
                "base directory {} does not exist",
                self.base_dir.display()
            )));
        }
        fs::read_dir(&self.base_dir).map_err(|e| CompileError::io(&self.base_dir, e))?;
        if self.output.as_os_str().is_empty() {
            return Err(CompileError::config("output path is empty"));
        }
        if self.output.is_dir() {
            return Err(CompileError::config(format!(
                "output path {} is a directory",
                self.output.display()
            )));
        }
        Ok(())
    }
}

/// Compiler tunables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompilerOptions {
    /// Directories and jar/zip archives searched for components, in order.
    /// Relative entries are resolved against the base directory.
    pub search_path: Vec<PathBuf>,
    pub duplicate_policy: DuplicatePolicy,
    /// Package of unqualified panel identifiers, slash-separated
    pub default_package: String,
    /// Entry point class, merged before any panel
    pub launcher: ComponentId,
    /// Resolve component artifacts concurrently
    pub parallel_resolution: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            search_path: vec![PathBuf::from(DEFAULT_SEARCH_PATH)],
            duplicate_policy: DuplicatePolicy::default(),
            default_package: DEFAULT_PANEL_PACKAGE.to_string(),
            launcher: ComponentId::from_static(DEFAULT_LAUNCHER),
            parallel_resolution: false,
        }
    }
}

impl CompilerOptions {
    /// Save options to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> AnyResult<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize compiler options to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write compiler options to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load options from a JSON file; missing fields take their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> AnyResult<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read compiler options from {:?}", path.as_ref()))?;

        let options: Self =
            serde_json::from_str(&content).context("Failed to parse compiler options JSON")?;

        Ok(options)
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        self.path_resolver()?;
        if !self.launcher.is_qualified() {
            return Err(CompileError::config(format!(
                "launcher '{}' must be a qualified class name",
                self.launcher
            )));
        }
        Ok(())
    }

    /// Resolver for the configured default package
    pub fn path_resolver(&self) -> Result<PathResolver> {
        let package = ResolvedPath::parse(&self.default_package).map_err(|e| {
            CompileError::config(format!("default_package: {e}"))
        })?;
        Ok(PathResolver::new(package))
    }

    /// Search path entries resolved against `data`'s base directory
    pub fn resolved_search_path(&self, data: &CompilerData) -> Vec<PathBuf> {
        self.search_path.iter().map(|p| data.resolve(p)).collect()
    }
}
