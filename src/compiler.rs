//! Compiler pipeline
//!
//! Drives one run from descriptor to finished archive:
//!
//! 1. **Resolving**: read and validate the descriptor, list the required
//!    components
//! 2. **Merging**: write the bootstrap entries, the launcher, every
//!    component, then the descriptor's resources, images and libraries
//! 3. **Finalized**: close the archive and move it to the output path
//!
//! Any error moves the run to `Failed`, deletes the partial archive and is
//! returned as is.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::archive::{remove_stale_output, ArchiveSink, OutputArchive};
use crate::bootstrap::bootstrap_unit;
use crate::compile_state::{CompileContext, CompileStage};
use crate::config::{CompilerData, CompilerOptions};
use crate::descriptor::{DescriptorReader, InstallDescriptor, JsonDescriptorReader};
use crate::error::{CompileError, Result};
use crate::identifier::ComponentId;
use crate::merge_manager::MergeManager;
use crate::mergeable::Mergeable;
use crate::search_path::ArtifactSearchPath;

/// Summary of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileReport {
    pub output: PathBuf,
    /// Launcher then required components, in merge order
    pub components: Vec<String>,
    /// Entry paths in write order
    pub entries: Vec<String>,
    /// Paths left to their first writer
    pub skipped: Vec<String>,
}

/// What the merging stage has committed so far
#[derive(Default)]
struct MergeProgress {
    components: Vec<String>,
    skipped: Vec<String>,
}

pub struct Compiler {
    data: CompilerData,
    options: CompilerOptions,
    merge_manager: MergeManager,
    reader: Box<dyn DescriptorReader>,
    context: CompileContext,
}

impl Compiler {
    pub fn new(
        data: CompilerData,
        options: CompilerOptions,
        merge_manager: MergeManager,
        reader: Box<dyn DescriptorReader>,
    ) -> Self {
        Self {
            data,
            options,
            merge_manager,
            reader,
            context: CompileContext::new(),
        }
    }

    /// Build a compiler with the JSON descriptor reader and a merge manager
    /// configured from `options`.
    ///
    /// # Errors
    ///
    /// `Config` if `data` or `options` do not validate or a search root
    /// cannot be opened.
    pub fn from_config(data: CompilerData, options: CompilerOptions) -> Result<Self> {
        data.validate()?;
        options.validate()?;

        let search_path = ArtifactSearchPath::new(options.resolved_search_path(&data))?;
        if search_path.is_empty() {
            warn!("search path is empty, only bootstrap entries can be written");
        }
        let merge_manager = MergeManager::new(search_path)
            .with_resolver(options.path_resolver()?)
            .with_policy(options.duplicate_policy);

        Ok(Self::new(
            data,
            options,
            merge_manager,
            Box::new(JsonDescriptorReader),
        ))
    }

    pub fn data(&self) -> &CompilerData {
        &self.data
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn merge_manager(&self) -> &MergeManager {
        &self.merge_manager
    }

    pub fn context(&self) -> &CompileContext {
        &self.context
    }

    #[inline]
    pub fn stage(&self) -> CompileStage {
        self.context.current_stage()
    }

    /// Run the whole pipeline once.
    pub fn execute_compiler(&mut self) -> Result<CompileReport> {
        let span = info_span!("compile", descriptor = %self.data.descriptor().display());
        let _guard = span.enter();

        self.context.transition_to(CompileStage::Resolving)?;

        match self.run() {
            Ok(report) => {
                info!(
                    output = %report.output.display(),
                    components = report.components.len(),
                    entries = report.entries.len(),
                    skipped = report.skipped.len(),
                    elapsed_ms = self.context.elapsed().as_millis() as u64,
                    "compilation finished"
                );
                Ok(report)
            }
            Err(err) => {
                if let Err(e) = self.context.fail() {
                    warn!(error = %e, "could not record failed stage");
                }
                error!(
                    stage = ?self.context.failed_at(),
                    kind = err.kind(),
                    error = %err,
                    "compilation failed"
                );
                Err(err)
            }
        }
    }

    fn run(&mut self) -> Result<CompileReport> {
        self.merge_manager.reset();
        remove_stale_output(self.data.output())?;

        let descriptor = self.reader.read_descriptor(self.data.descriptor())?;
        descriptor.validate()?;
        let components = descriptor.required_components();
        info!(
            app = %descriptor.info.appname,
            components = components.len(),
            "descriptor resolved"
        );

        self.context.transition_to(CompileStage::Merging)?;

        let mut archive = OutputArchive::create(self.data.output())?;
        let progress = match self.merge_all(&descriptor, &components, &mut archive) {
            Ok(progress) => progress,
            Err(err) => {
                archive.discard();
                return Err(err);
            }
        };
        let entries = archive.finalize()?;

        self.context.transition_to(CompileStage::Finalized)?;

        Ok(CompileReport {
            output: self.data.output().to_path_buf(),
            components: progress.components,
            entries,
            skipped: progress.skipped,
        })
    }

    fn merge_all(
        &mut self,
        descriptor: &InstallDescriptor,
        components: &[ComponentId],
        archive: &mut OutputArchive,
    ) -> Result<MergeProgress> {
        let mut progress = MergeProgress::default();

        let bootstrap = bootstrap_unit(descriptor, &self.options.launcher)?;
        self.commit(&bootstrap, archive, &mut progress)?;

        let launcher = self.merge_manager.resolve_component(&self.options.launcher)?;
        self.commit(&launcher, archive, &mut progress)?;
        progress.components.push(self.options.launcher.to_string());

        if self.options.parallel_resolution {
            let manager = &self.merge_manager;
            let resolved: Vec<Result<Mergeable>> = components
                .par_iter()
                .map(|id| manager.resolve_component(id))
                .collect();
            debug!(components = resolved.len(), "resolved components in parallel");

            for (id, unit) in components.iter().zip(resolved) {
                self.commit(&unit?, archive, &mut progress)?;
                progress.components.push(id.to_string());
            }
        } else {
            for id in components {
                let unit = self.merge_manager.resolve_component(id)?;
                self.commit(&unit, archive, &mut progress)?;
                progress.components.push(id.to_string());
            }
        }

        for unit in self.descriptor_units(descriptor)? {
            self.commit(&unit, archive, &mut progress)?;
        }

        Ok(progress)
    }

    fn commit(
        &mut self,
        unit: &Mergeable,
        sink: &mut dyn ArchiveSink,
        progress: &mut MergeProgress,
    ) -> Result<()> {
        let outcome = self.merge_manager.merge_mergeable(unit, sink)?;
        progress.skipped.extend(outcome.skipped);
        Ok(())
    }

    /// Resources, images and libraries, in that order
    fn descriptor_units(&self, descriptor: &InstallDescriptor) -> Result<Vec<Mergeable>> {
        let mut units = Vec::new();

        for resource in &descriptor.resources {
            let origin = format!("resource:{}", resource.id);
            let source = self.data.resolve(&resource.src);
            let target = format!("resources/{}", resource.id);
            units.push(file_or_dir(origin, &source, &target, resource.shared)?);
        }

        for image in &descriptor.images {
            let origin = format!("image:{}", image.target);
            let source = self.data.resolve(&image.src);
            units.push(Mergeable::single_file(origin, &source, &image.target, false)?);
        }

        for library in &descriptor.libraries {
            let origin = format!("library:{}", library.src.display());
            let source = self.data.resolve(&library.src);
            units.push(Mergeable::library(origin, &source, library.shared)?);
        }

        Ok(units)
    }
}

fn file_or_dir(origin: String, source: &Path, target: &str, shared: bool) -> Result<Mergeable> {
    if source.is_dir() {
        Mergeable::resource_dir(origin, source, target, shared)
    } else if source.is_file() {
        Mergeable::single_file(origin, source, target, shared)
    } else {
        Err(CompileError::SourceNotFound {
            origin,
            path: source.to_path_buf(),
        })
    }
}
