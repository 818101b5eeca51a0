use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use parz_core::engine::{compress_file, decompress_file, default_workers, CompressOptions};
use parz_core::format::{self, ContainerHeader, DEFAULT_BLOCK_SIZE, DEFAULT_LEVEL};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "parz",
    about = "Parallel block compressor — create, extract, and inspect PARZIP1 containers",
    version
)]
struct Cli {
    /// Enable per-block debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a PARZIP1 container
    Compress {
        /// Source file to compress
        input: PathBuf,
        /// Destination container file
        output: PathBuf,
        /// Worker threads (default: available CPUs, capped at 32)
        #[arg(short, long)]
        threads: Option<usize>,
        /// Raw bytes per block (default: 65536 = 64 KB)
        #[arg(short, long, default_value_t = DEFAULT_BLOCK_SIZE)]
        block_size: u32,
        /// zlib compression level 0–9
        #[arg(short, long, default_value_t = DEFAULT_LEVEL)]
        level: u32,
        /// Overwrite the output without asking
        #[arg(short, long)]
        force: bool,
    },
    /// Decompress a PARZIP1 container back to the original file
    Decompress {
        /// Source container file
        input: PathBuf,
        /// Destination file
        output: PathBuf,
        /// Worker threads (default: available CPUs, capped at 32)
        #[arg(short, long)]
        threads: Option<usize>,
        /// Overwrite the output without asking
        #[arg(short, long)]
        force: bool,
    },
    /// Print header metadata and descriptor-table statistics
    Inspect {
        /// Container file to inspect
        file: PathBuf,
        /// Print per-block descriptor details
        #[arg(long)]
        blocks: bool,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn ensure_input_exists(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("input file {} does not exist", path.display());
    }
    Ok(())
}

/// Refuse to clobber an existing output unless the user confirms or passed
/// `--force`.
fn confirm_overwrite(path: &Path, force: bool) -> anyhow::Result<bool> {
    if force || !path.exists() {
        return Ok(true);
    }
    eprint!("output file {} already exists. Overwrite? [y/N] ", path.display());
    io::stderr().flush()?;
    let mut response = String::new();
    io::stdin().lock().read_line(&mut response)?;
    Ok(matches!(response.trim(), "y" | "Y" | "yes"))
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_compress(
    input: PathBuf,
    output: PathBuf,
    threads: Option<usize>,
    block_size: u32,
    level: u32,
    force: bool,
) -> anyhow::Result<()> {
    ensure_input_exists(&input)?;
    if !confirm_overwrite(&output, force)? {
        eprintln!("operation cancelled.");
        return Ok(());
    }

    let opts = CompressOptions {
        workers: threads.unwrap_or_else(default_workers),
        block_size,
        level,
    };

    let t0 = Instant::now();
    let summary = compress_file(&input, &output, &opts)?;
    let elapsed = t0.elapsed();

    let on_disk = std::fs::metadata(&output)?.len();
    let ratio = if summary.payload_size > 0 {
        summary.original_size as f64 / summary.payload_size as f64
    } else {
        1.0
    };

    eprintln!("  blocks      : {}", summary.block_count);
    eprintln!("  block size  : {}", human_bytes(block_size as u64));
    eprintln!("  workers     : {}", opts.workers);
    eprintln!("  level       : {}", level);
    eprintln!("  original    : {}", human_bytes(summary.original_size));
    eprintln!("  payload     : {}", human_bytes(summary.payload_size));
    eprintln!("  on disk     : {} (includes reserved gaps)", human_bytes(on_disk));
    eprintln!("  ratio       : {:.2}x", ratio);
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((summary.original_size as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_decompress(
    input: PathBuf,
    output: PathBuf,
    threads: Option<usize>,
    force: bool,
) -> anyhow::Result<()> {
    ensure_input_exists(&input)?;
    if !confirm_overwrite(&output, force)? {
        eprintln!("operation cancelled.");
        return Ok(());
    }

    let workers = threads.unwrap_or_else(default_workers);
    let t0 = Instant::now();
    let summary = decompress_file(&input, &output, workers)?;
    let elapsed = t0.elapsed();

    eprintln!("  blocks      : {}", summary.block_count);
    eprintln!("  workers     : {}", workers);
    eprintln!("  recovered   : {}", human_bytes(summary.original_size));
    eprintln!(
        "  throughput  : {}/s",
        human_bytes((summary.original_size as f64 / elapsed.as_secs_f64()) as u64)
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_inspect(file: PathBuf, show_blocks: bool) -> anyhow::Result<()> {
    let mut src = File::open(&file)
        .with_context(|| format!("opening container {}", file.display()))?;
    let header = ContainerHeader::read_from(&mut src)?;
    let table = format::read_table(&mut src, header.block_count)?;

    let on_disk = std::fs::metadata(&file)?.len();
    let payload: u64 = table.iter().map(|d| d.compressed_size as u64).sum();
    let ratio = if payload > 0 {
        header.original_size as f64 / payload as f64
    } else {
        1.0
    };

    println!("=== PARZIP1 container: {} ===", file.display());
    println!();
    println!("  block count : {}", header.block_count);
    println!("  block size  : {}", human_bytes(header.block_size as u64));
    println!("  level       : {}", header.level);
    println!("  original    : {}", human_bytes(header.original_size));
    println!("  payload     : {}", human_bytes(payload));
    println!("  on disk     : {}", human_bytes(on_disk));
    println!("  ratio       : {:.2}x", ratio);

    if show_blocks {
        println!();
        println!(
            "  {:>8}  {:>12}  {:>12}  {:>14}",
            "block", "original", "compressed", "file offset"
        );
        println!("  {}", "-".repeat(52));
        for descriptor in &table {
            println!(
                "  {:>8}  {:>12}  {:>12}  {:>14}",
                descriptor.id,
                human_bytes(descriptor.original_size as u64),
                human_bytes(descriptor.compressed_size as u64),
                descriptor.offset
            );
        }
    }

    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(log_level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto)
        .context("initializing logger")?;

    match cli.command {
        Commands::Compress {
            input,
            output,
            threads,
            block_size,
            level,
            force,
        } => run_compress(input, output, threads, block_size, level, force),
        Commands::Decompress {
            input,
            output,
            threads,
            force,
        } => run_decompress(input, output, threads, force),
        Commands::Inspect { file, blocks } => run_inspect(file, blocks),
    }
}
