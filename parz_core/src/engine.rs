use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::thread;

use anyhow::{anyhow, bail, Context};
use log::{debug, info, warn};

use crate::codec;
use crate::format::{
    self, ContainerHeader, DEFAULT_BLOCK_SIZE, DEFAULT_LEVEL, MAX_BLOCK_SIZE, MAX_LEVEL,
    MAX_WORKERS, MIN_BLOCK_SIZE,
};
use crate::plan;
use crate::writer::SyncWriter;

/// Validated knobs for a compression run.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Concurrent workers per round (1..=MAX_WORKERS).
    pub workers: usize,
    /// Nominal raw bytes per block (MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).
    pub block_size: u32,
    /// zlib compression level (0..=MAX_LEVEL).
    pub level: u32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            block_size: DEFAULT_BLOCK_SIZE,
            level: DEFAULT_LEVEL,
        }
    }
}

/// Default worker budget: one per available processor, capped at
/// `MAX_WORKERS`.
pub fn default_workers() -> usize {
    num_cpus::get().clamp(1, MAX_WORKERS)
}

impl CompressOptions {
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_workers(self.workers)?;
        if self.block_size < MIN_BLOCK_SIZE || self.block_size > MAX_BLOCK_SIZE {
            bail!(
                "block size {} out of range ({}..={} bytes)",
                self.block_size,
                MIN_BLOCK_SIZE,
                MAX_BLOCK_SIZE
            );
        }
        if self.level > MAX_LEVEL {
            bail!("compression level {} out of range (0..={})", self.level, MAX_LEVEL);
        }
        Ok(())
    }
}

fn validate_workers(workers: usize) -> anyhow::Result<()> {
    if workers == 0 || workers > MAX_WORKERS {
        bail!("worker count {} out of range (1..={})", workers, MAX_WORKERS);
    }
    Ok(())
}

/// Aggregate result of a finished run, for callers that print statistics.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub block_count: u32,
    pub original_size: u64,
    /// Sum of compressed payload bytes across blocks. The container on disk
    /// is larger: it holds worst-case reservations, not packed payloads.
    pub payload_size: u64,
}

/// One unit of work for a compression worker: which block, and which byte
/// extent of the source file it covers. Built fresh per round and moved into
/// the worker that owns it.
struct CompressTask {
    block_id: u32,
    read_offset: u64,
    read_len: usize,
}

/// One unit of work for a decompression worker: the recorded payload extent
/// and the nominal output position.
struct DecompressTask {
    block_id: u32,
    payload_offset: u64,
    payload_len: usize,
    write_offset: u64,
    raw_len: usize,
}

/// Run `worker` over `tasks` in bounded rounds of at most `workers` threads.
///
/// Every worker launched in a round runs to completion; results are
/// aggregated only after the whole round has been joined, so a failure never
/// interrupts an in-flight worker — it just stops further rounds from being
/// launched. Blocks from an interrupted run may therefore be partially
/// written; the caller reports overall failure and the output must not be
/// treated as valid.
fn run_rounds<T, F>(tasks: Vec<T>, workers: usize, worker: F) -> anyhow::Result<()>
where
    T: Send,
    F: Fn(T) -> anyhow::Result<()> + Sync,
{
    let mut remaining = tasks;
    while !remaining.is_empty() {
        let launch = workers.min(remaining.len());
        let round: Vec<T> = remaining.drain(..launch).collect();

        let results: Vec<anyhow::Result<()>> = thread::scope(|scope| {
            let worker = &worker;
            let handles: Vec<_> = round
                .into_iter()
                .map(|task| scope.spawn(move || worker(task)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("worker thread panicked")))
                })
                .collect()
        });

        // Joined the full round; stop scheduling if anything failed. Every
        // failing block stays visible: extra failures from the same round
        // are logged before the first is propagated.
        let mut failures: Vec<anyhow::Error> = results.into_iter().filter_map(Result::err).collect();
        if !failures.is_empty() {
            for extra in failures.drain(1..) {
                warn!("further worker failure in the same round: {:#}", extra);
            }
            return Err(failures.remove(0));
        }
    }
    Ok(())
}

/// Compress `input` into a PARZIP1 container at `output`.
///
/// Blocks are compressed independently by parallel workers; each payload
/// lands at an offset reserved up front from its worst-case capacity, so the
/// final container bytes are identical regardless of scheduling order or
/// worker count.
pub fn compress_file(
    input: &Path,
    output: &Path,
    opts: &CompressOptions,
) -> anyhow::Result<RunSummary> {
    opts.validate()?;

    let original_size = std::fs::metadata(input)
        .with_context(|| format!("reading metadata of {}", input.display()))?
        .len();

    let table = plan::plan_blocks(original_size, opts.block_size);
    let header = ContainerHeader {
        block_count: table.len() as u32,
        block_size: opts.block_size,
        level: opts.level,
        original_size,
    };

    info!(
        "compressing {} ({} bytes): {} blocks of {} bytes, {} workers, level {}",
        input.display(),
        original_size,
        header.block_count,
        opts.block_size,
        opts.workers,
        opts.level
    );

    let mut out = File::create(output)
        .with_context(|| format!("creating output file {}", output.display()))?;
    out.write_all(&header.to_bytes())?;
    // Placeholder table: compressed sizes are zero until the rounds finish,
    // then the whole region is rewritten with the completed descriptors.
    format::write_table(&mut out, &table)?;

    let tasks: Vec<CompressTask> = table
        .iter()
        .map(|descriptor| CompressTask {
            block_id: descriptor.id,
            read_offset: descriptor.id as u64 * opts.block_size as u64,
            read_len: descriptor.original_size as usize,
        })
        .collect();

    let writer = SyncWriter::new(out, table);
    let level = opts.level;

    run_rounds(tasks, opts.workers, |task| {
        // Each worker opens its own read handle, so no read position is shared.
        let mut src = File::open(input)
            .with_context(|| format!("block {}: reopening {}", task.block_id, input.display()))?;
        src.seek(SeekFrom::Start(task.read_offset))?;
        let mut raw = vec![0u8; task.read_len];
        src.read_exact(&mut raw)
            .with_context(|| format!("block {}: short read from source", task.block_id))?;

        let payload = codec::compress(&raw, level)
            .with_context(|| format!("block {}: compression failed", task.block_id))?;
        debug!(
            "block {}: {} -> {} bytes",
            task.block_id,
            task.read_len,
            payload.len()
        );

        writer
            .commit_block(task.block_id, &payload)
            .with_context(|| format!("block {}: writing payload", task.block_id))
    })?;

    writer.flush_table()?;
    let (_file, table) = writer.finish()?;

    let payload_size: u64 = table.iter().map(|d| d.compressed_size as u64).sum();
    info!(
        "compressed {} -> {} payload bytes across {} blocks",
        original_size, payload_size, header.block_count
    );

    Ok(RunSummary {
        block_count: header.block_count,
        original_size,
        payload_size,
    })
}

/// Decompress the PARZIP1 container at `input` back into `output`.
///
/// The descriptor table stored in the container is trusted as written;
/// corruption inside a payload surfaces as a zlib error or as a mismatch
/// between the decompressed length and the recorded original size.
pub fn decompress_file(input: &Path, output: &Path, workers: usize) -> anyhow::Result<RunSummary> {
    validate_workers(workers)?;

    let mut src = File::open(input)
        .with_context(|| format!("opening container {}", input.display()))?;
    let header = ContainerHeader::read_from(&mut src)
        .with_context(|| format!("reading header of {}", input.display()))?;
    let table = format::read_table(&mut src, header.block_count)
        .with_context(|| format!("reading descriptor table of {}", input.display()))?;
    drop(src);

    info!(
        "decompressing {}: {} blocks of {} bytes, {} workers, original size {}",
        input.display(),
        header.block_count,
        header.block_size,
        workers,
        header.original_size
    );

    let out = File::create(output)
        .with_context(|| format!("creating output file {}", output.display()))?;
    // Pre-size the output so every positioned write lands inside the file.
    out.set_len(header.original_size)?;

    let payload_size: u64 = table.iter().map(|d| d.compressed_size as u64).sum();
    let block_size = header.block_size as u64;
    let tasks: Vec<DecompressTask> = table
        .iter()
        .map(|descriptor| DecompressTask {
            block_id: descriptor.id,
            payload_offset: descriptor.offset,
            payload_len: descriptor.compressed_size as usize,
            write_offset: descriptor.id as u64 * block_size,
            raw_len: descriptor.original_size as usize,
        })
        .collect();

    let writer = SyncWriter::new(out, Vec::new());

    run_rounds(tasks, workers, |task| {
        let mut src = File::open(input)
            .with_context(|| format!("block {}: reopening {}", task.block_id, input.display()))?;
        src.seek(SeekFrom::Start(task.payload_offset))?;
        let mut payload = vec![0u8; task.payload_len];
        src.read_exact(&mut payload)
            .with_context(|| format!("block {}: short read of payload", task.block_id))?;

        let raw = codec::decompress(&payload, task.raw_len)
            .with_context(|| format!("block {}: corrupt payload", task.block_id))?;
        debug!(
            "block {}: {} -> {} bytes",
            task.block_id,
            task.payload_len,
            raw.len()
        );

        writer
            .write_at(task.write_offset, &raw)
            .with_context(|| format!("block {}: writing output", task.block_id))
    })?;

    writer.finish()?;
    info!(
        "decompressed {} blocks back to {} bytes",
        header.block_count, header.original_size
    );

    Ok(RunSummary {
        block_count: header.block_count,
        original_size: header.original_size,
        payload_size,
    })
}
