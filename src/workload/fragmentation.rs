//! Fragmentation scenario
//!
//! 1. Create `files` allocations of random size
//! 2. Delete `deletions` randomly drawn files
//! 3. Try one large allocation
//!
//! A drawn file that never got space, or that an earlier draw already
//! deleted, is recorded but not freed again. The pool is drained before
//! returning, so the allocator ends fully free.

use crate::allocator::{AllocationHandle, BlockAllocator, BlockId, PoolSnapshot};
use crate::config::FragmentationConfig;
use crate::error::Result;
use crate::rng::LibcRand;
use crate::workload::{draw_index, draw_size, try_allocate};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub blocks: usize,
    /// `None` when the file could not be allocated
    pub first_block: Option<BlockId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionOutcome {
    Freed,
    AlreadyFreed,
    NeverAllocated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deletion {
    /// 0-based index into the file list
    pub file: usize,
    pub outcome: DeletionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentationReport {
    pub allocator: String,
    pub seed: u32,
    pub files: Vec<FileRecord>,
    pub deletions: Vec<Deletion>,
    pub free_blocks_before_large: usize,
    pub largest_free_run_before_large: usize,
    pub large_file_blocks: usize,
    /// `None` when the large allocation failed
    pub large_file_start: Option<BlockId>,
    /// Pool state right after the large allocation attempt
    pub snapshot: PoolSnapshot,
}

impl FragmentationReport {
    pub fn large_file_allocated(&self) -> bool {
        self.large_file_start.is_some()
    }

    pub fn blocks_freed(&self) -> usize {
        self.deletions
            .iter()
            .filter(|d| d.outcome == DeletionOutcome::Freed)
            .map(|d| self.files[d.file].blocks)
            .sum()
    }
}

/// Run the scenario with the glibc-compatible generator
pub fn run_fragmentation<A: BlockAllocator>(
    alloc: &mut A,
    config: &FragmentationConfig,
    seed: u32,
) -> Result<FragmentationReport> {
    run_fragmentation_with::<A, LibcRand>(alloc, config, seed)
}

/// Run the scenario with any seedable generator
pub fn run_fragmentation_with<A, R>(
    alloc: &mut A,
    config: &FragmentationConfig,
    seed: u32,
) -> Result<FragmentationReport>
where
    A: BlockAllocator,
    R: RngCore + SeedableRng,
{
    config.validate()?;
    info!(
        "Running {} fragmentation scenario (seed {}, {} files)",
        alloc.name(),
        seed,
        config.files
    );
    alloc.reset();
    let mut rng = R::seed_from_u64(u64::from(seed));

    let mut files = Vec::with_capacity(config.files);
    let mut handles = Vec::with_capacity(config.files);
    for _ in 0..config.files {
        let blocks = draw_size(&mut rng, config.min_file_blocks, config.max_file_blocks);
        let handle = try_allocate(alloc, blocks)?;
        files.push(FileRecord {
            blocks,
            first_block: handle.map(|h| h.first_block()),
        });
        handles.push(handle);
    }

    let mut deletions = Vec::with_capacity(config.deletions);
    for _ in 0..config.deletions {
        let file = draw_index(&mut rng, config.files);
        let outcome = match handles[file].take() {
            Some(handle) => {
                alloc.free(handle)?;
                DeletionOutcome::Freed
            }
            None if files[file].first_block.is_none() => DeletionOutcome::NeverAllocated,
            None => DeletionOutcome::AlreadyFreed,
        };
        debug!("Deleting file {}: {:?}", file + 1, outcome);
        deletions.push(Deletion { file, outcome });
    }

    let before = alloc.dump();
    let large = try_allocate(alloc, config.large_file_blocks)?;
    let snapshot = alloc.dump();

    match large {
        Some(handle) => info!(
            "Large file of {} blocks allocated at block {}",
            config.large_file_blocks,
            handle.first_block()
        ),
        None => info!(
            "Cannot place large file of {} blocks ({} free, largest run {})",
            config.large_file_blocks,
            before.free_count(),
            before.largest_free_run()
        ),
    }

    // Drain
    for handle in large.into_iter().chain(handles.into_iter().flatten()) {
        alloc.free(handle)?;
    }

    Ok(FragmentationReport {
        allocator: alloc.name().to_string(),
        seed,
        files,
        deletions,
        free_blocks_before_large: before.free_count(),
        largest_free_run_before_large: before.largest_free_run(),
        large_file_blocks: config.large_file_blocks,
        large_file_start: large.map(|h| h.first_block()),
        snapshot,
    })
}
