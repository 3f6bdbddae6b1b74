//! Installation descriptor
//!
//! The descriptor declares what goes into the installer: application info,
//! variables, the panels shown to the user, installer listeners, and the
//! resources, images and libraries bundled with them. The compiler core only
//! needs to know *which* components are required; everything else is carried
//! through to the archive.
//!
//! # Format
//!
//! Descriptors are JSON files:
//! ```json
//! {
//!   "info": { "appname": "Hello", "appversion": "1.0" },
//!   "variables": { "InstallPath": "/opt/hello" },
//!   "panels": [ { "classname": "HelloPanel" }, { "classname": "FinishPanel", "id": "done" } ],
//!   "listeners": [ "com.example.install.AuditListener" ],
//!   "resources": [ { "id": "HTMLInfoPanel.info", "src": "docs/info.html" } ],
//!   "images": [ { "src": "icons/JFrameIcon.png", "target": "img/JFrameIcon.png" } ],
//!   "libraries": [ { "src": "lib/extras.jar", "shared": true } ]
//! }
//! ```
//!
//! Source paths are relative to the project base directory.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::archive::validate_entry_path;
use crate::identifier::ComponentId;

/// Errors raised while reading or validating a descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    /// Descriptor file could not be read
    #[error("Failed to read descriptor {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// Descriptor is not valid JSON or does not match the schema
    #[error("Failed to parse descriptor {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// Descriptor parsed but is not usable
    #[error("Invalid descriptor: {reason}")]
    Invalid { reason: String },
}

impl DescriptorError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// Application metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppInfo {
    pub appname: String,
    pub appversion: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One panel of the installer UI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PanelSpec {
    pub classname: ComponentId,
    /// Instance id, needed when the same panel class is shown twice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Named resource, stored under `resources/<id>`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceSpec {
    pub id: String,
    pub src: PathBuf,
    #[serde(default)]
    pub shared: bool,
}

/// Image stored at an exact archive path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSpec {
    pub src: PathBuf,
    pub target: String,
}

/// Jar/zip whose content is merged into the installer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LibrarySpec {
    pub src: PathBuf,
    #[serde(default)]
    pub shared: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallDescriptor {
    pub info: AppInfo,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub panels: Vec<PanelSpec>,
    #[serde(default)]
    pub listeners: Vec<ComponentId>,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub images: Vec<ImageSpec>,
    #[serde(default)]
    pub libraries: Vec<LibrarySpec>,
}

impl InstallDescriptor {
    /// Components to merge: panels, then listeners, each once, in order of
    /// first appearance.
    pub fn required_components(&self) -> Vec<ComponentId> {
        let mut seen = HashSet::new();
        self.panels
            .iter()
            .map(|p| &p.classname)
            .chain(self.listeners.iter())
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect()
    }

    /// Panel instance id, defaulting to the class name
    pub fn panel_id(panel: &PanelSpec) -> &str {
        panel.id.as_deref().unwrap_or(panel.classname.as_str())
    }

    /// Check what the compiler relies on.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.info.appname.trim().is_empty() {
            return Err(DescriptorError::invalid("info.appname must not be empty"));
        }
        if self.panels.is_empty() {
            return Err(DescriptorError::invalid("at least one panel is required"));
        }

        let mut panel_ids = HashSet::new();
        for panel in &self.panels {
            let id = Self::panel_id(panel);
            if !panel_ids.insert(id) {
                return Err(DescriptorError::invalid(format!(
                    "duplicate panel id '{id}' (set a distinct \"id\" for repeated panels)"
                )));
            }
        }

        let mut resource_ids = HashSet::new();
        for resource in &self.resources {
            if resource.id.is_empty() || resource.id.contains('/') || resource.id.contains('\\') {
                return Err(DescriptorError::invalid(format!(
                    "resource id '{}' must be a single non-empty path segment",
                    resource.id
                )));
            }
            if validate_entry_path(&resource.id).is_err() {
                return Err(DescriptorError::invalid(format!(
                    "resource id '{}' is not a valid entry name",
                    resource.id
                )));
            }
            if !resource_ids.insert(resource.id.as_str()) {
                return Err(DescriptorError::invalid(format!(
                    "duplicate resource id '{}'",
                    resource.id
                )));
            }
        }

        for image in &self.images {
            if let Err(e) = validate_entry_path(&image.target) {
                return Err(DescriptorError::invalid(format!(
                    "image {}: {e}",
                    image.src.display()
                )));
            }
        }

        Ok(())
    }
}

/// Supplier of installation descriptors
pub trait DescriptorReader {
    fn read_descriptor(&self, location: &Path) -> Result<InstallDescriptor, DescriptorError>;

    /// Ordered list of components the descriptor requires.
    fn read_required_components(
        &self,
        location: &Path,
    ) -> Result<Vec<ComponentId>, DescriptorError> {
        let descriptor = self.read_descriptor(location)?;
        descriptor.validate()?;
        Ok(descriptor.required_components())
    }
}

/// Reads JSON descriptors from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDescriptorReader;

impl DescriptorReader for JsonDescriptorReader {
    fn read_descriptor(&self, location: &Path) -> Result<InstallDescriptor, DescriptorError> {
        let content = fs::read_to_string(location).map_err(|e| DescriptorError::Read {
            path: location.to_path_buf(),
            reason: e.to_string(),
        })?;

        let descriptor: InstallDescriptor =
            serde_json::from_str(&content).map_err(|e| DescriptorError::Parse {
                path: location.to_path_buf(),
                reason: e.to_string(),
            })?;

        debug!(
            path = %location.display(),
            panels = descriptor.panels.len(),
            listeners = descriptor.listeners.len(),
            resources = descriptor.resources.len(),
            images = descriptor.images.len(),
            libraries = descriptor.libraries.len(),
            "descriptor loaded"
        );
        Ok(descriptor)
    }
}
