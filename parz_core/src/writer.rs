use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;

use crate::format::{self, BlockDescriptor, HEADER_SIZE};

/// Shared output handle for a compression or decompression run.
///
/// Every positioned write — compressed payload, decompressed payload, or
/// descriptor-table rewrite — and every descriptor mutation goes through the
/// single lock in here. The lock is deliberately coarse: workers target
/// disjoint byte regions and could in principle write concurrently, but one
/// mutex over the handle and the table keeps the design simple and is the
/// known parallelism bottleneck.
pub struct SyncWriter {
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    /// Descriptor table for the compression path. Left empty when
    /// decompressing (the table already lives in the source container).
    table: Vec<BlockDescriptor>,
}

impl SyncWriter {
    pub fn new(file: File, table: Vec<BlockDescriptor>) -> Self {
        Self {
            inner: Mutex::new(Inner { file, table }),
        }
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("output writer lock poisoned by a failed worker"))
    }

    /// Positioned write of `bytes` at `offset`.
    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(bytes)?;
        Ok(())
    }

    /// Compression path: write `payload` at the block's reserved offset and
    /// record its compressed size in the descriptor, under one lock hold.
    pub fn commit_block(&self, block_id: u32, payload: &[u8]) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        let offset = inner
            .table
            .get(block_id as usize)
            .ok_or_else(|| anyhow!("block {} missing from descriptor table", block_id))?
            .offset;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(payload)?;
        inner.table[block_id as usize].compressed_size = payload.len() as u32;
        Ok(())
    }

    /// Extend or truncate the output file to `len` bytes.
    pub fn set_len(&self, len: u64) -> anyhow::Result<()> {
        let inner = self.lock()?;
        inner.file.set_len(len)?;
        Ok(())
    }

    /// Rewrite the descriptor-table region from the in-memory table, once
    /// every block's compressed size has been recorded.
    pub fn flush_table(&self) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        let Inner { file, table } = &mut *inner;
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        format::write_table(file, table)?;
        Ok(())
    }

    /// Flush and release the output handle, returning the final table.
    pub fn finish(self) -> anyhow::Result<(File, Vec<BlockDescriptor>)> {
        let mut inner = self
            .inner
            .into_inner()
            .map_err(|_| anyhow!("output writer lock poisoned by a failed worker"))?;
        inner.file.flush()?;
        Ok((inner.file, inner.table))
    }
}
