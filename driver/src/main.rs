// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

#![deny(elided_lifetimes_in_paths)]

use std::{path::PathBuf, process::exit, str::FromStr};

use anyhow::{anyhow, Context};
use clap::Subcommand;
use colored::Colorize;
use ilc_compiler::{Architecture, Compilation, CompilationOptions, OperatingSystem, Platform};
use log::LevelFilter;

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Repeat for more detail.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

impl Args {
    pub fn parse_args() -> Self {
        use clap::Parser;
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compiles a module manifest into a native object file.
    Compile {
        manifest: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_parser = Architecture::from_str)]
        target: Option<Architecture>,

        #[arg(long, value_parser = OperatingSystem::from_str)]
        os: Option<OperatingSystem>,

        /// Defaults to the number of CPUs.
        #[arg(long)]
        workers: Option<usize>,

        #[arg(long)]
        xml_dump: Option<PathBuf>,

        #[arg(long)]
        map: Option<PathBuf>,

        /// Extra roots, either `Type` or `Type::Method`.
        #[arg(long)]
        root: Vec<String>,
    },
}

fn main() {
    let args = Args::parse_args();
    initialize_logger(args.verbose);

    let result = match args.command {
        Commands::Compile { manifest, output, target, os, workers, xml_dump, map, root } => {
            compile(CompileArgs { manifest, output, target, os, workers, xml_dump, map, root })
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "error".red().bold(), e.to_string().bold());
        for cause in e.chain().skip(1) {
            eprintln!("  {} {cause}", "caused by:".bright_black());
        }
        exit(1);
    }
}

fn initialize_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

struct CompileArgs {
    manifest: PathBuf,
    output: Option<PathBuf>,
    target: Option<Architecture>,
    os: Option<OperatingSystem>,
    workers: Option<usize>,
    xml_dump: Option<PathBuf>,
    map: Option<PathBuf>,
    root: Vec<String>,
}

fn compile(args: CompileArgs) -> anyhow::Result<()> {
    let host = Platform::host_platform();
    let architecture = args.target
        .or(host.map(|x| x.architecture()))
        .ok_or_else(|| anyhow!("unable to detect the host architecture, pass --target"))?;
    let operating_system = args.os
        .or(host.map(|x| x.operating_system()))
        .ok_or_else(|| anyhow!("unable to detect the host operating system, pass --os"))?;
    let platform = Platform::new(architecture, operating_system);

    let mut options = CompilationOptions::new(platform);
    if let Some(workers) = args.workers {
        options = options.with_workers(workers);
    }
    if let Some(path) = args.xml_dump {
        options = options.with_xml_dump(path);
    }
    if let Some(path) = args.map {
        options = options.with_map_file(path);
    }
    for root in args.root {
        options = options.with_root(root);
    }

    let output = args.output.unwrap_or_else(|| args.manifest.with_extension(operating_system.object_extension()));

    let compilation = Compilation::from_manifest_file(&args.manifest, options)
        .with_context(|| format!("failed to load {}", args.manifest.display()))?;

    let module = compilation.compile()
        .with_context(|| format!("failed to compile {}", args.manifest.display()))?;

    module.emit(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    let statistics = module.statistics();
    eprintln!(
        "{} {} ({} methods, {} replaced by throwing bodies, {} nodes)",
        "Compiled".green().bold(),
        output.display(),
        statistics.methods_compiled,
        statistics.methods_failed,
        module.nodes().len(),
    );

    Ok(())
}
