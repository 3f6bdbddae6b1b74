//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use panelpack::{CompilerData, CompilerOptions};

pub const INSTALLER_CLASS: &str = "com/izforge/izpack/installer/Installer.class";
pub const HELLO_CLASS: &str = "com/izforge/izpack/panels/HelloPanel.class";
pub const HELLO_INNER_CLASS: &str = "com/izforge/izpack/panels/HelloPanel$1.class";
pub const FINISH_CLASS: &str = "com/izforge/izpack/panels/FinishPanel.class";

/// Project laid out on disk: a `lib/` search root with the launcher and two
/// panels, an icon, a document, and a descriptor.
pub struct SampleProject {
    dir: TempDir,
    descriptor: Value,
}

impl SampleProject {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let project = Self {
            dir,
            descriptor: json!({
                "info": { "appname": "Hello", "appversion": "1.0" },
                "variables": { "InstallPath": "/opt/hello" },
                "panels": [ { "classname": "HelloPanel" }, { "classname": "FinishPanel" } ],
                "images": [ { "src": "icons/JFrameIcon.png", "target": "img/JFrameIcon.png" } ],
                "resources": [ { "id": "HTMLInfoPanel.info", "src": "docs/info.html" } ]
            }),
        };

        project.write_file(&format!("lib/{INSTALLER_CLASS}"), b"installer");
        project.write_file(&format!("lib/{HELLO_CLASS}"), b"hello");
        project.write_file(&format!("lib/{HELLO_INNER_CLASS}"), b"hello-inner");
        project.write_file(&format!("lib/{FINISH_CLASS}"), b"finish");
        project.write_file("icons/JFrameIcon.png", b"\x89PNG icon");
        project.write_file("docs/info.html", b"<html>info</html>");
        project
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.root().join("install.json")
    }

    pub fn output_path(&self) -> PathBuf {
        self.root().join("out/install.jar")
    }

    pub fn write_file(&self, rel: &str, data: &[u8]) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, data).expect("write");
        path
    }

    /// Write a zip archive at `rel` containing `entries`
    pub fn write_jar(&self, rel: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        let mut writer = ZipWriter::new(fs::File::create(&path).expect("create jar"));
        for (name, data) in entries {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .expect("start entry");
            writer.write_all(data).expect("write entry");
        }
        writer.finish().expect("finish jar");
        path
    }

    /// Edit the descriptor before it is written
    pub fn descriptor_mut(&mut self) -> &mut Value {
        &mut self.descriptor
    }

    pub fn set_panels(&mut self, panels: &[&str]) {
        self.descriptor["panels"] = Value::Array(
            panels
                .iter()
                .map(|p| json!({ "classname": p }))
                .collect(),
        );
    }

    pub fn write_descriptor(&self) -> PathBuf {
        let path = self.descriptor_path();
        fs::write(
            &path,
            serde_json::to_string_pretty(&self.descriptor).expect("serialize"),
        )
        .expect("write descriptor");
        path
    }

    pub fn data(&self) -> CompilerData {
        CompilerData::new(self.write_descriptor(), self.root(), self.output_path())
    }

    pub fn data_with_output(&self, output: PathBuf) -> CompilerData {
        CompilerData::new(self.write_descriptor(), self.root(), output)
    }

    pub fn options(&self) -> CompilerOptions {
        CompilerOptions::default()
    }
}
