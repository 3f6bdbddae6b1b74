//! panelpack - Main entry point
//!
//! Thin command line front end over the compiler library.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use panelpack::archive::list_entries;
use panelpack::cli::{default_base_dir, Cli, Commands, DEFAULT_OUTPUT_NAME};
use panelpack::descriptor::{DescriptorReader, InstallDescriptor, JsonDescriptorReader};
use panelpack::merge_manager::DuplicatePolicy;
use panelpack::path_resolver::{PathResolver, ResolvedPath};
use panelpack::{logging, Compiler, CompilerData, CompilerOptions};

/// Main application entry point
fn main() {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);
    debug!("CLI arguments parsed");

    let result = match cli.command {
        Commands::Compile {
            descriptor,
            base_dir,
            output,
            classpath,
            options,
            on_duplicate,
            parallel,
            json,
        } => run_compile(CompileArgs {
            descriptor,
            base_dir,
            output,
            classpath,
            options,
            on_duplicate,
            parallel,
            json,
        }),
        Commands::Validate { descriptor } => run_validate(&descriptor),
        Commands::Resolve {
            identifier,
            default_package,
        } => run_resolve(&identifier, default_package.as_deref()),
        Commands::List { archive } => run_list(&archive),
    };

    if let Err(e) = result {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

struct CompileArgs {
    descriptor: PathBuf,
    base_dir: Option<PathBuf>,
    output: Option<PathBuf>,
    classpath: Vec<PathBuf>,
    options: Option<PathBuf>,
    on_duplicate: Option<DuplicatePolicy>,
    parallel: bool,
    json: bool,
}

fn run_compile(args: CompileArgs) -> Result<()> {
    let mut options = match &args.options {
        Some(path) => {
            info!("Loading compiler options from {:?}", path);
            CompilerOptions::load_from_file(path)?
        }
        None => CompilerOptions::default(),
    };

    if !args.classpath.is_empty() {
        // Command line entries are relative to the working directory
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        options.search_path = args.classpath.iter().map(|p| cwd.join(p)).collect();
    }
    if let Some(policy) = args.on_duplicate {
        options.duplicate_policy = policy;
    }
    if args.parallel {
        options.parallel_resolution = true;
    }

    let base_dir = args
        .base_dir
        .unwrap_or_else(|| default_base_dir(&args.descriptor));
    let output = args
        .output
        .unwrap_or_else(|| base_dir.join(DEFAULT_OUTPUT_NAME));
    let data = CompilerData::new(&args.descriptor, base_dir, output);

    let mut compiler = Compiler::from_config(data, options)?;
    let report = compiler.execute_compiler()?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .context("Failed to serialize compile report")?;
        println!("{json}");
    } else {
        println!(
            "✓ Wrote {} ({} entries, {} components)",
            report.output.display(),
            report.entries.len(),
            report.components.len()
        );
        for path in &report.skipped {
            println!("  skipped shared entry {path}");
        }
    }
    Ok(())
}

fn run_validate(descriptor: &Path) -> Result<()> {
    info!("Validating descriptor: {:?}", descriptor);
    let parsed: InstallDescriptor = JsonDescriptorReader.read_descriptor(descriptor)?;
    parsed.validate()?;

    println!(
        "✓ Descriptor is valid: {} {}",
        parsed.info.appname, parsed.info.appversion
    );
    for component in parsed.required_components() {
        println!("  {component}");
    }
    Ok(())
}

fn run_resolve(identifier: &str, default_package: Option<&str>) -> Result<()> {
    let resolver = match default_package {
        Some(pkg) => PathResolver::new(ResolvedPath::parse(pkg)?),
        None => PathResolver::default(),
    };
    println!("{}", resolver.resolve(identifier)?);
    Ok(())
}

fn run_list(archive: &Path) -> Result<()> {
    for entry in list_entries(archive)? {
        println!("{entry}");
    }
    Ok(())
}
