//! DVE Group Builder CLI Application
//!
//! Command-line front end for the dve-group-builder library:
//! - Loads a YAML signal-group configuration
//! - Patches a DVE session file with the generated Tcl
//! - Dry-run and instruction dump modes for inspecting the result

use anyhow::{Context, Result};
use clap::Parser;
use dve_group_builder::{splicer, AnchorPolicy, Generator};
use std::path::PathBuf;

/// DVE Group Builder - Generate signal groups for DVE session files
#[derive(Parser, Debug)]
#[command(name = "dve-group-cli")]
#[command(about = "Generate DVE signal groups from YAML and patch a session file", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the YAML group configuration
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Path to the DVE session file to patch (never modified)
    #[arg(short, long, value_name = "FILE")]
    source: PathBuf,

    /// Output session file (default: patched_<source> next to the source)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Insert at the first occurrence of a duplicated anchor instead of failing
    #[arg(long)]
    first_anchor: bool,

    /// Print the generated Tcl sections to stdout instead of writing a file
    #[arg(long)]
    dry_run: bool,

    /// Print the expanded instruction list as JSON and exit
    #[arg(long, conflicts_with = "dry_run")]
    dump_instructions: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("DVE Group Builder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using builder library v{}", dve_group_builder::VERSION);

    let policy = if args.first_anchor {
        AnchorPolicy::FirstMatch
    } else {
        AnchorPolicy::Unique
    };

    let generator = Generator::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration {:?}", args.config))?
        .with_anchor_policy(policy);

    if args.dump_instructions {
        dump_instructions(&generator)
    } else if args.dry_run {
        dry_run(&generator, &args)
    } else {
        patch(&generator, &args)
    }
}

/// Print the expanded instructions as a JSON array
fn dump_instructions(generator: &Generator) -> Result<()> {
    let instructions = generator
        .instructions()
        .context("Failed to expand configuration")?;
    let json = serde_json::to_string_pretty(&instructions)?;
    println!("{}", json);
    Ok(())
}

/// Check the source anchors and print both sections without writing anything
fn dry_run(generator: &Generator, args: &Args) -> Result<()> {
    let generation = generator
        .generate()
        .context("Failed to expand configuration")?;
    let host = splicer::read_source(&args.source)?;
    generator
        .splice_script(&host, &generation.script, &args.source)
        .with_context(|| format!("Failed to patch {:?}", args.source))?;

    print!("{}", generation.script.signal_groups);
    println!();
    print!("{}", generation.script.view);
    Ok(())
}

/// Patch the source file and report what was added
fn patch(generator: &Generator, args: &Args) -> Result<()> {
    let generation = generator
        .generate()
        .context("Failed to expand configuration")?;

    let output = generator
        .patch_file_with(&generation.script, &args.source, args.output.as_deref())
        .with_context(|| format!("Failed to patch {:?}", args.source))?;

    let stats = generation.stats;
    log::info!(
        "Added {} groups, {} signals and {} dividers",
        stats.groups,
        stats.signals,
        stats.dividers
    );
    if !args.quiet {
        println!("{}", output.display());
    }
    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
