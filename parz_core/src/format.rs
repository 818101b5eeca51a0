use std::io::{Read, Write};

/// Magic bytes for PARZIP version 1 containers.
pub const MAGIC: &[u8; 8] = b"PARZIP1\0";

/// Fixed size of the container header in bytes.
///   magic[8] + block_count:u32 + block_size:u32 + level:u32
///   + original_size:u64
///   = 8 + 4 + 4 + 4 + 8 = 28
pub const HEADER_SIZE: u64 = 28;

/// Size of each BlockDescriptor record in the descriptor table, in bytes.
///   id:u32 + original_size:u32 + compressed_size:u32 + offset:u64
///   = 4 + 4 + 4 + 8 = 20
pub const DESCRIPTOR_SIZE: u64 = 20;

/// Default nominal block size: 64 KB.
pub const DEFAULT_BLOCK_SIZE: u32 = 64 * 1024;

/// Accepted nominal block size range: 1 KB to 16 MB.
pub const MIN_BLOCK_SIZE: u32 = 1024;
pub const MAX_BLOCK_SIZE: u32 = 16 * 1024 * 1024;

/// zlib compression level range and default.
pub const MAX_LEVEL: u32 = 9;
pub const DEFAULT_LEVEL: u32 = 6;

/// Upper bound on concurrent workers per run.
pub const MAX_WORKERS: usize = 32;

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the 28-byte PARZIP1 container header.
///
/// All fields are serialized explicitly little-endian, so containers are
/// byte-order portable regardless of the producing host.
#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub block_count: u32,
    /// Nominal raw bytes per block (the last block may be smaller).
    pub block_size: u32,
    /// zlib compression level used to produce the payloads (0–9).
    pub level: u32,
    /// Total uncompressed size of the original file in bytes.
    pub original_size: u64,
}

impl ContainerHeader {
    /// Serialize to exactly `HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut buf = [0u8; HEADER_SIZE as usize];
        buf[..8].copy_from_slice(MAGIC);
        buf[8..12].copy_from_slice(&self.block_count.to_le_bytes());
        buf[12..16].copy_from_slice(&self.block_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.level.to_le_bytes());
        buf[20..28].copy_from_slice(&self.original_size.to_le_bytes());
        buf
    }

    /// Deserialize from `HEADER_SIZE` bytes, checking the magic.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE as usize]) -> anyhow::Result<Self> {
        if &buf[..8] != MAGIC {
            anyhow::bail!("invalid magic bytes — not a PARZIP1 container");
        }
        Ok(Self {
            block_count: u32::from_le_bytes(buf[8..12].try_into()?),
            block_size: u32::from_le_bytes(buf[12..16].try_into()?),
            level: u32::from_le_bytes(buf[16..20].try_into()?),
            original_size: u64::from_le_bytes(buf[20..28].try_into()?),
        })
    }

    /// Read and validate a header from the current position of `src`.
    pub fn read_from<R: Read>(src: &mut R) -> anyhow::Result<Self> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        src.read_exact(&mut buf)?;
        Self::from_bytes(&buf)
    }

    /// Byte size of the descriptor table described by this header.
    pub fn table_size(&self) -> u64 {
        self.block_count as u64 * DESCRIPTOR_SIZE
    }

    /// Offset of the first byte past the descriptor table.
    pub fn payload_start(&self) -> u64 {
        HEADER_SIZE + self.table_size()
    }
}

// ── Block descriptor ────────────────────────────────────────────────────────

/// One entry in the descriptor table — locates and describes a single block.
///
/// Descriptor at table index `i` always describes block `i`; the stored `id`
/// is redundant with the position but kept in the record for inspection.
#[derive(Debug, Clone, Default)]
pub struct BlockDescriptor {
    pub id: u32,
    /// Length of the original uncompressed block in bytes.
    pub original_size: u32,
    /// Length of the compressed payload in bytes. Zero until the
    /// compression pass for this block has completed.
    pub compressed_size: u32,
    /// Absolute byte offset of this block's payload within the container.
    pub offset: u64,
}

impl BlockDescriptor {
    /// Serialize to exactly `DESCRIPTOR_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_SIZE as usize] {
        let mut buf = [0u8; DESCRIPTOR_SIZE as usize];
        buf[0..4].copy_from_slice(&self.id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.original_size.to_le_bytes());
        buf[8..12].copy_from_slice(&self.compressed_size.to_le_bytes());
        buf[12..20].copy_from_slice(&self.offset.to_le_bytes());
        buf
    }

    /// Deserialize from `DESCRIPTOR_SIZE` bytes.
    pub fn from_bytes(buf: &[u8; DESCRIPTOR_SIZE as usize]) -> anyhow::Result<Self> {
        Ok(Self {
            id: u32::from_le_bytes(buf[0..4].try_into()?),
            original_size: u32::from_le_bytes(buf[4..8].try_into()?),
            compressed_size: u32::from_le_bytes(buf[8..12].try_into()?),
            offset: u64::from_le_bytes(buf[12..20].try_into()?),
        })
    }
}

// ── Descriptor table ────────────────────────────────────────────────────────

/// Read `block_count` descriptors from the current position of `src`.
pub fn read_table<R: Read>(src: &mut R, block_count: u32) -> anyhow::Result<Vec<BlockDescriptor>> {
    let mut table = Vec::with_capacity(block_count as usize);
    let mut buf = [0u8; DESCRIPTOR_SIZE as usize];
    for _ in 0..block_count {
        src.read_exact(&mut buf)?;
        table.push(BlockDescriptor::from_bytes(&buf)?);
    }
    Ok(table)
}

/// Write the full descriptor table at the current position of `dst`.
pub fn write_table<W: Write>(dst: &mut W, table: &[BlockDescriptor]) -> anyhow::Result<()> {
    for descriptor in table {
        dst.write_all(&descriptor.to_bytes())?;
    }
    Ok(())
}
