use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::merge_manager::DuplicatePolicy;

/// Default output file name, placed in the base directory
pub const DEFAULT_OUTPUT_NAME: &str = "install.jar";

/// panelpack - Merge installer components into a single distributable archive
#[derive(Parser)]
#[command(name = "panelpack")]
#[command(about = "Compile an installation descriptor and its components into an installer archive")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the installer archive for a descriptor
    Compile {
        /// Path to the installation descriptor (JSON)
        descriptor: PathBuf,

        /// Directory descriptor paths are relative to (defaults to the descriptor's directory)
        #[arg(short, long)]
        base_dir: Option<PathBuf>,

        /// Output archive (defaults to install.jar in the base directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Search path entry, directory or jar/zip; repeat to add more.
        /// Replaces the search path from the options file.
        #[arg(long = "classpath", value_name = "PATH")]
        classpath: Vec<PathBuf>,

        /// Compiler options file (JSON)
        #[arg(long)]
        options: Option<PathBuf>,

        /// What to do when two units write the same entry
        #[arg(long, value_name = "POLICY")]
        on_duplicate: Option<DuplicatePolicy>,

        /// Resolve components concurrently
        #[arg(long)]
        parallel: bool,

        /// Print the compile report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Read and validate a descriptor, then print its required components
    Validate {
        /// Path to the installation descriptor (JSON)
        descriptor: PathBuf,
    },
    /// Print the archive directory a component identifier resolves to
    Resolve {
        /// Simple or qualified component identifier
        identifier: String,

        /// Package for simple identifiers, slash-separated
        #[arg(long)]
        default_package: Option<String>,
    },
    /// Print the entry paths of an archive
    List {
        /// Path to a jar/zip archive
        archive: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

/// Base directory for a descriptor when none is given
pub fn default_base_dir(descriptor: &Path) -> PathBuf {
    match descriptor.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["panelpack"]).is_err());
    }

    #[test]
    fn test_cli_compile_defaults() {
        let cli = Cli::try_parse_from(["panelpack", "compile", "project/install.json"])
            .expect("parse");
        match cli.command {
            Commands::Compile {
                descriptor,
                base_dir,
                output,
                classpath,
                on_duplicate,
                parallel,
                json,
                ..
            } => {
                assert_eq!(descriptor, PathBuf::from("project/install.json"));
                assert!(base_dir.is_none());
                assert!(output.is_none());
                assert!(classpath.is_empty());
                assert!(on_duplicate.is_none());
                assert!(!parallel);
                assert!(!json);
            }
            _ => panic!("Expected Compile command"),
        }
    }

    #[test]
    fn test_cli_compile_full() {
        let cli = Cli::try_parse_from([
            "panelpack",
            "-vv",
            "compile",
            "install.json",
            "--output",
            "out/setup.jar",
            "--classpath",
            "lib",
            "--classpath",
            "vendor/panels.jar",
            "--on-duplicate",
            "skip-identical",
            "--parallel",
        ])
        .expect("parse");
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Compile {
                output,
                classpath,
                on_duplicate,
                parallel,
                ..
            } => {
                assert_eq!(output, Some(PathBuf::from("out/setup.jar")));
                assert_eq!(classpath.len(), 2);
                assert_eq!(on_duplicate, Some(DuplicatePolicy::SkipIdentical));
                assert!(parallel);
            }
            _ => panic!("Expected Compile command"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_policy() {
        let result = Cli::try_parse_from([
            "panelpack",
            "compile",
            "install.json",
            "--on-duplicate",
            "overwrite",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_resolve_command() {
        let cli = Cli::try_parse_from(["panelpack", "resolve", "com.acme.Foo"]).expect("parse");
        match cli.command {
            Commands::Resolve {
                identifier,
                default_package,
            } => {
                assert_eq!(identifier, "com.acme.Foo");
                assert!(default_package.is_none());
            }
            _ => panic!("Expected Resolve command"),
        }
    }

    #[test]
    fn test_default_base_dir() {
        assert_eq!(
            default_base_dir(Path::new("project/install.json")),
            PathBuf::from("project")
        );
        assert_eq!(default_base_dir(Path::new("install.json")), PathBuf::from("."));
    }
}
