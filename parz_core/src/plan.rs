use crate::codec;
use crate::format::{BlockDescriptor, DESCRIPTOR_SIZE, HEADER_SIZE};

/// Number of blocks needed to cover `original_size` bytes.
///
/// A zero-byte input maps to zero blocks: the container is then a bare
/// header with an empty descriptor table, and decompression of it produces
/// an empty file.
pub fn block_count(original_size: u64, block_size: u32) -> u32 {
    original_size.div_ceil(block_size as u64) as u32
}

/// Lay out the descriptor table for a compression run.
///
/// Every block except the last has the nominal `block_size`; the last block
/// carries the remainder. Payload offsets start immediately after the
/// descriptor table and advance by each block's worst-case compressed
/// capacity, so every worker can write its payload to a final, disjoint
/// position without coordinating with any other worker. The trade-off is
/// that the container keeps unused gaps wherever a payload comes in under
/// its reservation; on-disk size reflects reservations, not payload bytes.
pub fn plan_blocks(original_size: u64, block_size: u32) -> Vec<BlockDescriptor> {
    let count = block_count(original_size, block_size);
    let mut table = Vec::with_capacity(count as usize);
    let mut offset = HEADER_SIZE + count as u64 * DESCRIPTOR_SIZE;

    for id in 0..count {
        let start = id as u64 * block_size as u64;
        let size = (original_size - start).min(block_size as u64) as u32;
        table.push(BlockDescriptor {
            id,
            original_size: size,
            compressed_size: 0,
            offset,
        });
        offset += codec::compress_bound(size as usize) as u64;
    }

    table
}
