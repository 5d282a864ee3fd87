//! Block allocation strategies for the simulated disk
//!
//! Two representations of the same free/used state:
//! - Bitmap: one bit per block, first-fit contiguous scan
//! - Linked list: free blocks threaded into a singly linked list, one chain per allocation
//!
//! Both implement [`BlockAllocator`] and agree on every externally observable
//! result (success/failure, free counts). Block placement may differ.

pub mod bitmap;
pub mod linked_list;

use crate::error::{PoolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of blocks in the simulated disk
pub const POOL_BLOCKS: usize = 64;

/// Index of a block within the pool
pub type BlockId = usize;

/// Free/used status of a single block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    Free,
    Used,
}

impl BlockState {
    pub fn is_free(self) -> bool {
        self == BlockState::Free
    }
}

/// Token returned by a successful allocation, sufficient to free it again
pub trait AllocationHandle: Copy + fmt::Debug + Eq {
    /// Start block (bitmap) or chain head (linked list)
    fn first_block(&self) -> BlockId;
}

/// A contiguous run of blocks `[start, start + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    /// Starting block ID
    pub start: BlockId,
    /// Number of contiguous blocks
    pub length: usize,
}

impl Extent {
    pub fn new(start: BlockId, length: usize) -> Self {
        Extent { start, length }
    }

    /// One past the last block
    pub fn end(&self) -> BlockId {
        self.start + self.length
    }

    /// Check if this extent contains a block ID
    pub fn contains(&self, block_id: BlockId) -> bool {
        block_id >= self.start && block_id < self.end()
    }

    /// Check if two extents share any block
    pub fn overlaps(&self, other: &Extent) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    pub fn blocks(&self) -> std::ops::Range<BlockId> {
        self.start..self.end()
    }
}

impl AllocationHandle for Extent {
    fn first_block(&self) -> BlockId {
        self.start
    }
}

/// Block allocator trait
///
/// Defines the interface shared by the bitmap and linked-list pools.
pub trait BlockAllocator {
    type Handle: AllocationHandle;

    /// Short label for logs and reports
    fn name(&self) -> &'static str;

    /// Return every block to the free state
    fn reset(&mut self);

    /// Reserve `need` blocks, all or nothing
    fn allocate(&mut self, need: usize) -> Result<Self::Handle>;

    /// Release the blocks behind a handle
    fn free(&mut self, handle: Self::Handle) -> Result<()>;

    fn state(&self, block_id: BlockId) -> Result<BlockState>;

    /// Free/used status of every block, in block order
    fn dump(&self) -> PoolSnapshot;

    /// Get total number of blocks managed
    fn capacity(&self) -> usize;

    /// Get number of free blocks available
    fn free_blocks(&self) -> usize;

    fn used_blocks(&self) -> usize {
        self.capacity() - self.free_blocks()
    }

    fn is_free(&self, block_id: BlockId) -> Result<bool> {
        Ok(self.state(block_id)?.is_free())
    }

    /// 0.0 = all free space in one run, higher = more scattered
    fn fragmentation_score(&self) -> f64 {
        self.dump().fragmentation_score()
    }
}

/// Reject requests outside `1..=capacity`.
///
/// Applied identically by both representations.
pub(crate) fn validate_request(need: usize, capacity: usize) -> Result<()> {
    if need == 0 || need > capacity {
        return Err(PoolError::InvalidRequest { need, capacity });
    }
    Ok(())
}

pub(crate) fn check_block(block_id: BlockId, capacity: usize) -> Result<()> {
    if block_id >= capacity {
        return Err(PoolError::InvalidBlockId(block_id));
    }
    Ok(())
}

/// Point-in-time copy of the free/used map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    blocks: Vec<BlockState>,
}

impl PoolSnapshot {
    pub fn new(blocks: Vec<BlockState>) -> Self {
        PoolSnapshot { blocks }
    }

    pub fn blocks(&self) -> &[BlockState] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, block_id: BlockId) -> Option<BlockState> {
        self.blocks.get(block_id).copied()
    }

    pub fn free_count(&self) -> usize {
        self.blocks.iter().filter(|s| s.is_free()).count()
    }

    pub fn used_count(&self) -> usize {
        self.blocks.len() - self.free_count()
    }

    /// Maximal runs of free blocks, lowest address first
    pub fn free_runs(&self) -> Vec<Extent> {
        let mut runs: Vec<Extent> = Vec::new();
        let mut in_run = false;

        for (block_id, state) in self.blocks.iter().enumerate() {
            if !state.is_free() {
                in_run = false;
                continue;
            }

            match runs.last_mut() {
                Some(run) if in_run => run.length += 1,
                _ => runs.push(Extent::new(block_id, 1)),
            }
            in_run = true;
        }

        runs
    }

    pub fn largest_free_run(&self) -> usize {
        self.free_runs().iter().map(|run| run.length).max().unwrap_or(0)
    }

    pub fn fragmentation_score(&self) -> f64 {
        let free = self.free_count();
        if free == 0 {
            return 0.0; // No free space = no fragmentation
        }

        let runs = self.free_runs().len();

        // Perfect score (1 run) = 0.0
        // Worst case (every free block isolated) approaches 1.0
        (runs as f64 - 1.0) / free as f64
    }
}

impl fmt::Display for PoolSnapshot {
    /// One character per block: `0` = free, `1` = used
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for state in &self.blocks {
            f.write_str(if state.is_free() { "0" } else { "1" })?;
        }
        Ok(())
    }
}

impl std::str::FromStr for PoolSnapshot {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(BlockState::Free),
                '1' => Ok(BlockState::Used),
                other => Err(PoolError::Corrupted(format!(
                    "unexpected character {:?} in block map",
                    other
                ))),
            })
            .collect::<Result<Vec<_>>>()
            .map(PoolSnapshot::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_contains() {
        let extent = Extent::new(10, 20);
        assert!(!extent.contains(9));
        assert!(extent.contains(10));
        assert!(extent.contains(29));
        assert!(!extent.contains(30));
        assert_eq!(extent.end(), 30);
    }

    #[test]
    fn test_extent_overlap() {
        let e1 = Extent::new(10, 10); // 10-19
        let e2 = Extent::new(20, 10); // 20-29
        let e3 = Extent::new(15, 10); // 15-24

        assert!(!e1.overlaps(&e2));
        assert!(e1.overlaps(&e3));
        assert!(e3.overlaps(&e2));
    }

    #[test]
    fn test_validate_request() {
        assert!(validate_request(1, POOL_BLOCKS).is_ok());
        assert!(validate_request(POOL_BLOCKS, POOL_BLOCKS).is_ok());
        assert!(matches!(
            validate_request(0, POOL_BLOCKS),
            Err(PoolError::InvalidRequest { need: 0, .. })
        ));
        assert!(matches!(
            validate_request(POOL_BLOCKS + 1, POOL_BLOCKS),
            Err(PoolError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn test_snapshot_render_and_parse() {
        let snapshot: PoolSnapshot = "1100111000".parse().unwrap();
        assert_eq!(snapshot.len(), 10);
        assert_eq!(snapshot.used_count(), 5);
        assert_eq!(snapshot.free_count(), 5);
        assert_eq!(snapshot.to_string(), "1100111000");

        assert!("10x1".parse::<PoolSnapshot>().is_err());
    }

    #[test]
    fn test_snapshot_free_runs() {
        let snapshot: PoolSnapshot = "0110001000".parse().unwrap();
        assert_eq!(
            snapshot.free_runs(),
            vec![Extent::new(0, 1), Extent::new(3, 3), Extent::new(7, 3)]
        );
        assert_eq!(snapshot.largest_free_run(), 3);
    }

    #[test]
    fn test_fragmentation_score() {
        let contiguous: PoolSnapshot = "1111000000".parse().unwrap();
        assert_eq!(contiguous.fragmentation_score(), 0.0);

        let full: PoolSnapshot = "1111".parse().unwrap();
        assert_eq!(full.fragmentation_score(), 0.0);

        let scattered: PoolSnapshot = "0101010101".parse().unwrap();
        assert!(scattered.fragmentation_score() > contiguous.fragmentation_score());
    }
}
