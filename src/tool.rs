// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for building and querying shard indexes

use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use humansize::{SizeFormatter, BINARY};
use shard_index::{file::TABLES_FOLDER, manifest::Manifest, Config, Fnv1, Index, Xxh3};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

pub fn init_tracing(quiet: bool, verbose: u8) -> (bool, LevelFilter) {
    let is_verbose = !quiet && verbose > 0;

    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Library code logs through the log crate
    tracing_log::LogTracer::init().expect("Failed to set log tracer");

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("SIDX_LOG")
        .from_env_lossy();

    let subscriber = Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing_panic::panic_hook(info);
        prev_hook(info);
    }));

    (is_verbose, level_filter)
}

fn parse_size_as_usize(s: &str) -> Result<usize, String> {
    let cfg = parse_size::Config::new().with_binary();
    cfg.parse_size(s)
        .map_err(|e| e.to_string())
        .and_then(|size| usize::try_from(size).map_err(|e| e.to_string()))
}

#[derive(ValueEnum, Copy, Clone, Debug, Default)]
enum FingerprintArg {
    #[default]
    Xxh3,
    Fnv1,
}

/// CLI tool for building and querying shard indexes
#[derive(Parser, Debug)]
#[command(name = "sidx")]
#[command(about = "CLI tool for building and querying shard indexes")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to the data log
    log_path: PathBuf,

    /// Folder to store the index in (defaults to the folder of the data log)
    #[arg(short, long, value_name = "FOLDER")]
    index_folder: Option<PathBuf>,

    /// Number of bits used to select a shard (0-8)
    #[arg(short, long, default_value_t = 8, value_parser = clap::value_parser!(u8).range(0..=8))]
    shard_bits: u8,

    /// Number of threads used to finalize shards
    #[arg(short, long, default_value_t = 8, value_parser = clap::value_parser!(u16).range(1..))]
    workers: u16,

    /// Scratch buffer size per shard (e.g., "1MiB", "65536")
    #[arg(
        short, long,
        default_value = "1MiB",
        value_parser = parse_size_as_usize,
        value_name = "SIZE",
    )]
    buffer_size: usize,

    /// Fingerprint function
    #[arg(short, long, value_enum, default_value_t = FingerprintArg::default())]
    fingerprint: FingerprintArg,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum ToolCommand {
    /// Build the index (discarding an existing one)
    Build,

    /// Get the values of one or more keys
    Get {
        /// The keys to look up
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Show index statistics
    Info,
}

fn open(args: &ToolArgs, force_rebuild: bool) -> shard_index::Result<Index> {
    let mut config = Config::new(&args.log_path)
        .shard_bits(args.shard_bits)
        .worker_count(usize::from(args.workers))
        .scratch_buffer_size(args.buffer_size)
        .force_rebuild(force_rebuild);

    if let Some(folder) = &args.index_folder {
        config = config.index_folder(folder);
    }

    config = match args.fingerprint {
        FingerprintArg::Xxh3 => config.fingerprinter(Xxh3),
        FingerprintArg::Fnv1 => config.fingerprinter(Fnv1),
    };

    config.open()
}

fn folder_size(path: &std::path::Path) -> std::io::Result<u64> {
    let mut size = 0;

    for entry in std::fs::read_dir(path)? {
        let metadata = entry?.metadata()?;
        if metadata.is_file() {
            size += metadata.len();
        }
    }

    Ok(size)
}

fn print_info(index: &Index) {
    println!("Data log: {}", index.path().display());
    println!(
        "Data log size: {}",
        SizeFormatter::new(index.log_size(), BINARY)
    );
    println!("Index folder: {}", index.index_folder().display());
    println!("Shards: {}", index.shard_count());

    match Manifest::load(index.index_folder()) {
        Ok(Some(manifest)) => {
            println!("Format version: {}", manifest.version);
            println!("Fingerprint: {}", manifest.fingerprint);
        }
        Ok(None) => println!("Manifest: missing"),
        Err(e) => println!("Manifest: {e}"),
    }

    match folder_size(&index.index_folder().join(TABLES_FOLDER)) {
        Ok(size) => println!("Table size: {}", SizeFormatter::new(size, BINARY)),
        Err(e) => println!("Table size: {e}"),
    }
}

fn main() {
    let args = ToolArgs::parse();
    let (verbose, level_filter) = init_tracing(args.quiet, args.verbose);

    let cmd = ToolArgs::command();

    info!(
        "starting {} ({} {}), log level: {level_filter}",
        cmd.get_name(),
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let force_rebuild = matches!(args.command, ToolCommand::Build);
    let start = Instant::now();

    let index = match open(&args, force_rebuild) {
        Ok(index) => index,
        Err(e) => {
            let note = if verbose {
                ""
            } else {
                ". Note: Use -v (one or multiple times) for more information"
            };
            die!("Error opening index: {}{}", e, note);
        }
    };

    match &args.command {
        ToolCommand::Build => {
            println!(
                "Built {} shards in {:?}",
                index.shard_count(),
                start.elapsed()
            );
        }
        ToolCommand::Get { keys } => {
            let mut missing = false;

            for key in keys {
                match index.get(key) {
                    Ok(Some(value)) => match std::str::from_utf8(&value) {
                        Ok(s) => println!("{s}"),
                        Err(_) => println!("{value:?}"),
                    },
                    Ok(None) => {
                        missing = true;
                        eprintln!("Key not found: {key}");
                    }
                    Err(e) => die!("Error getting key {}: {}", key, e),
                }
            }

            if missing {
                std::process::exit(2);
            }
        }
        ToolCommand::Info => print_info(&index),
    }

    index.close();
}
