//! Bootstrap entries
//!
//! Entries the compiler generates itself and writes before any component:
//! the jar manifest naming the launcher, and the descriptor data the
//! installer reads at startup.

use serde::Serialize;

use crate::descriptor::InstallDescriptor;
use crate::error::{CompileError, Result};
use crate::identifier::ComponentId;
use crate::mergeable::Mergeable;
use crate::search_path::EntrySource;

/// Origin label of the generated unit
pub const BOOTSTRAP_ORIGIN: &str = "bootstrap";

pub const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";
pub const INFO_ENTRY: &str = "resources/info";
pub const VARIABLES_ENTRY: &str = "resources/vars";
pub const PANELS_ORDER_ENTRY: &str = "resources/panelsOrder";

#[derive(Serialize)]
struct PanelOrderEntry<'a> {
    classname: &'a str,
    id: &'a str,
}

/// Jar manifest text with `launcher` as `Main-Class`
pub fn manifest(launcher: &ComponentId) -> String {
    format!(
        "Manifest-Version: 1.0\r\nCreated-By: {} {}\r\nMain-Class: {}\r\n\r\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        launcher
    )
}

/// All bootstrap entries as one unit, in write order.
pub fn bootstrap_unit(descriptor: &InstallDescriptor, launcher: &ComponentId) -> Result<Mergeable> {
    let panels: Vec<PanelOrderEntry<'_>> = descriptor
        .panels
        .iter()
        .map(|p| PanelOrderEntry {
            classname: p.classname.as_str(),
            id: InstallDescriptor::panel_id(p),
        })
        .collect();

    let files = vec![
        (MANIFEST_ENTRY.to_string(), manifest(launcher).into_bytes()),
        (INFO_ENTRY.to_string(), to_json(INFO_ENTRY, &descriptor.info)?),
        (VARIABLES_ENTRY.to_string(), to_json(VARIABLES_ENTRY, &descriptor.variables)?),
        (PANELS_ORDER_ENTRY.to_string(), to_json(PANELS_ORDER_ENTRY, &panels)?),
    ];

    Mergeable::tree(
        BOOTSTRAP_ORIGIN,
        "",
        files
            .into_iter()
            .map(|(path, data)| (path, EntrySource::Bytes(data)))
            .collect(),
        false,
    )
}

fn to_json<T: Serialize + ?Sized>(entry: &str, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(value)
        .map_err(|e| CompileError::config(format!("cannot serialize {entry}: {e}")))
}
