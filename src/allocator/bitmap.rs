//! Bitmap allocator
//!
//! One bit per block, packed into 64-bit words. Contiguous runs are not
//! stored; they are rediscovered by a left-to-right scan on every request.

use crate::allocator::{
    check_block, validate_request, BlockAllocator, BlockId, BlockState, Extent, PoolSnapshot,
    POOL_BLOCKS,
};
use crate::error::{PoolError, Result};

const BITMAP_WORDS: usize = (POOL_BLOCKS + 63) / 64;

/// First-fit contiguous allocator over a bit-vector
///
/// Represents free/allocated state with bits:
/// - 0 = free block
/// - 1 = allocated block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapAllocator {
    /// Bitmap words (each word = 64 bits = 64 blocks)
    bitmap: [u64; BITMAP_WORDS],

    /// Number of free blocks available
    free_blocks: usize,
}

impl BitmapAllocator {
    /// Create a new bitmap allocator with every block free
    pub fn new() -> Self {
        BitmapAllocator {
            bitmap: [0u64; BITMAP_WORDS],
            free_blocks: POOL_BLOCKS,
        }
    }

    /// Check if a specific block is allocated
    pub fn is_allocated(&self, block_id: BlockId) -> bool {
        if block_id >= POOL_BLOCKS {
            return false;
        }

        let word_idx = block_id / 64;
        let bit_idx = block_id % 64;

        (self.bitmap[word_idx] & (1u64 << bit_idx)) != 0
    }

    fn set_bit(&mut self, block_id: BlockId) {
        self.bitmap[block_id / 64] |= 1u64 << (block_id % 64);
    }

    fn clear_bit(&mut self, block_id: BlockId) {
        self.bitmap[block_id / 64] &= !(1u64 << (block_id % 64));
    }

    /// Allocate `need` contiguous blocks, lowest-addressed run first
    ///
    /// Nothing is written until a full-length run has been found, so a
    /// failed scan leaves the bitmap untouched.
    pub fn allocate_contiguous(&mut self, need: usize) -> Result<Extent> {
        validate_request(need, POOL_BLOCKS)?;

        let mut run_start = 0;
        let mut run_length = 0;

        for block_id in 0..POOL_BLOCKS {
            if self.is_allocated(block_id) {
                run_length = 0;
                continue;
            }

            if run_length == 0 {
                run_start = block_id;
            }
            run_length += 1;

            if run_length == need {
                let extent = Extent::new(run_start, need);
                for block in extent.blocks() {
                    self.set_bit(block);
                }
                self.free_blocks -= need;

                tracing::trace!("Allocated blocks {}..{}", extent.start, extent.end());
                return Ok(extent);
            }
        }

        tracing::debug!(
            "No run of {} free blocks ({} free in total)",
            need,
            self.free_blocks
        );
        Err(PoolError::OutOfSpace { need })
    }

    /// Clear `count` blocks beginning at `start`
    ///
    /// The whole range is checked before any bit changes: it must lie inside
    /// the pool and every block in it must currently be allocated.
    pub fn free_range(&mut self, start: BlockId, count: usize) -> Result<()> {
        if count == 0 {
            return Err(PoolError::InvalidRequest {
                need: count,
                capacity: POOL_BLOCKS,
            });
        }
        check_block(start, POOL_BLOCKS)?;
        let last = start
            .checked_add(count - 1)
            .ok_or(PoolError::InvalidBlockId(start))?;
        check_block(last, POOL_BLOCKS)?;

        let extent = Extent::new(start, count);
        if let Some(block_id) = extent.blocks().find(|&b| !self.is_allocated(b)) {
            // Already free - this is a double-free bug
            tracing::warn!("Double-free detected for block {}", block_id);
            return Err(PoolError::InvalidHandle(start));
        }

        for block_id in extent.blocks() {
            self.clear_bit(block_id);
        }
        self.free_blocks += count;

        tracing::trace!("Freed blocks {}..{}", extent.start, extent.end());
        Ok(())
    }
}

impl Default for BitmapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockAllocator for BitmapAllocator {
    type Handle = Extent;

    fn name(&self) -> &'static str {
        "bitmap"
    }

    fn reset(&mut self) {
        self.bitmap = [0u64; BITMAP_WORDS];
        self.free_blocks = POOL_BLOCKS;
    }

    fn allocate(&mut self, need: usize) -> Result<Extent> {
        self.allocate_contiguous(need)
    }

    fn free(&mut self, handle: Extent) -> Result<()> {
        self.free_range(handle.start, handle.length)
    }

    fn state(&self, block_id: BlockId) -> Result<BlockState> {
        check_block(block_id, POOL_BLOCKS)?;
        Ok(if self.is_allocated(block_id) {
            BlockState::Used
        } else {
            BlockState::Free
        })
    }

    fn dump(&self) -> PoolSnapshot {
        PoolSnapshot::new(
            (0..POOL_BLOCKS)
                .map(|block_id| {
                    if self.is_allocated(block_id) {
                        BlockState::Used
                    } else {
                        BlockState::Free
                    }
                })
                .collect(),
        )
    }

    fn capacity(&self) -> usize {
        POOL_BLOCKS
    }

    fn free_blocks(&self) -> usize {
        self.free_blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_creation() {
        let alloc = BitmapAllocator::new();
        assert_eq!(alloc.capacity(), POOL_BLOCKS);
        assert_eq!(alloc.free_blocks(), POOL_BLOCKS);
        assert_eq!(alloc.dump().to_string(), "0".repeat(POOL_BLOCKS));
    }

    #[test]
    fn test_bitmap_allocation() {
        let mut alloc = BitmapAllocator::new();

        let extent = alloc.allocate_contiguous(10).unwrap();
        assert_eq!(extent, Extent::new(0, 10));
        assert_eq!(alloc.free_blocks(), POOL_BLOCKS - 10);

        for block_id in extent.blocks() {
            assert!(alloc.is_allocated(block_id));
        }
        assert!(!alloc.is_allocated(10));
    }

    #[test]
    fn test_bitmap_free() {
        let mut alloc = BitmapAllocator::new();

        let extent = alloc.allocate_contiguous(10).unwrap();
        alloc.free_range(extent.start, extent.length).unwrap();
        assert_eq!(alloc.free_blocks(), POOL_BLOCKS);

        for block_id in extent.blocks() {
            assert!(!alloc.is_allocated(block_id));
        }
    }

    #[test]
    fn test_first_fit_skips_short_gaps() {
        let mut alloc = BitmapAllocator::new();

        let a = alloc.allocate_contiguous(2).unwrap(); // 0-1
        let _b = alloc.allocate_contiguous(3).unwrap(); // 2-4
        let c = alloc.allocate_contiguous(4).unwrap(); // 5-8
        let _d = alloc.allocate_contiguous(1).unwrap(); // 9

        alloc.free(a).unwrap(); // gap of 2 at 0
        alloc.free(c).unwrap(); // gap of 4 at 5

        // 3 does not fit at 0, lowest run that fits starts at 5
        assert_eq!(alloc.allocate_contiguous(3).unwrap().start, 5);
        // 2 fits the first gap
        assert_eq!(alloc.allocate_contiguous(2).unwrap().start, 0);
        // 1 goes into the leftover block 8
        assert_eq!(alloc.allocate_contiguous(1).unwrap().start, 8);
    }

    #[test]
    fn test_bitmap_out_of_space_leaves_state() {
        let mut alloc = BitmapAllocator::new();

        // Every other block used: 32 free blocks, none adjacent
        for _ in 0..POOL_BLOCKS {
            alloc.allocate_contiguous(1).unwrap();
        }
        for block_id in (0..POOL_BLOCKS).step_by(2) {
            alloc.free_range(block_id, 1).unwrap();
        }
        let before = alloc.clone();

        let result = alloc.allocate_contiguous(2);
        assert!(matches!(result, Err(PoolError::OutOfSpace { need: 2 })));
        assert_eq!(alloc, before);
    }

    #[test]
    fn test_bitmap_invalid_requests() {
        let mut alloc = BitmapAllocator::new();

        assert!(matches!(
            alloc.allocate_contiguous(0),
            Err(PoolError::InvalidRequest { need: 0, .. })
        ));
        assert!(matches!(
            alloc.allocate_contiguous(POOL_BLOCKS + 1),
            Err(PoolError::InvalidRequest { .. })
        ));
        assert_eq!(alloc.free_blocks(), POOL_BLOCKS);
    }

    #[test]
    fn test_bitmap_invalid_block_id() {
        let mut alloc = BitmapAllocator::new();

        let result = alloc.free_range(POOL_BLOCKS, 1);
        assert!(matches!(result, Err(PoolError::InvalidBlockId(_))));

        let result = alloc.free_range(60, 5); // Runs past the end
        assert!(matches!(result, Err(PoolError::InvalidBlockId(64))));

        assert!(matches!(
            alloc.state(POOL_BLOCKS),
            Err(PoolError::InvalidBlockId(_))
        ));
    }

    #[test]
    fn test_bitmap_double_free_rejected() {
        let mut alloc = BitmapAllocator::new();

        let a = alloc.allocate_contiguous(4).unwrap();
        let b = alloc.allocate_contiguous(4).unwrap();
        alloc.free(a).unwrap();
        let before = alloc.clone();

        assert!(matches!(alloc.free(a), Err(PoolError::InvalidHandle(0))));
        // Partially free range is rejected as a whole
        assert!(matches!(
            alloc.free_range(2, 4),
            Err(PoolError::InvalidHandle(2))
        ));
        assert_eq!(alloc, before);

        alloc.free(b).unwrap();
        assert_eq!(alloc.free_blocks(), POOL_BLOCKS);
    }

    #[test]
    fn test_bitmap_reset() {
        let mut alloc = BitmapAllocator::new();
        alloc.allocate_contiguous(40).unwrap();
        alloc.reset();
        assert_eq!(alloc, BitmapAllocator::new());
    }

    #[test]
    fn test_fragmentation_score() {
        let mut alloc = BitmapAllocator::new();

        // No allocation = no fragmentation
        let score1 = alloc.fragmentation_score();

        let extents: Vec<_> = (0..8).map(|_| alloc.allocate_contiguous(4).unwrap()).collect();
        for extent in extents.iter().step_by(2) {
            alloc.free(*extent).unwrap();
        }
        let score2 = alloc.fragmentation_score();

        assert!(score2 > score1);
    }
}
