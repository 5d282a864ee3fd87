//! Deterministic workloads driven against any [`BlockAllocator`]
//!
//! - [`trace`] - fixed request sequence, snapshot after every step
//! - [`fragmentation`] - random files, random deletions, one large request
//! - [`speed`] - repeated fill/drain cycles, timed
//!
//! Random draws are `rng.next_u32() % n`, taken in a fixed order (file size,
//! then its allocation; deletion indices afterwards). With [`LibcRand`] this
//! replays a C program calling `srand(seed)` / `rand() % n` exactly.
//!
//! [`LibcRand`]: crate::rng::LibcRand

pub mod fragmentation;
pub mod speed;
pub mod trace;

pub use fragmentation::{
    run_fragmentation, run_fragmentation_with, Deletion, DeletionOutcome, FileRecord,
    FragmentationReport,
};
pub use speed::{run_speed, run_speed_with, SpeedReport};
pub use trace::{run_trace, TraceReport, TraceStep};

use crate::allocator::BlockAllocator;
use crate::error::{PoolError, Result};
use rand::RngCore;

/// Draw a size in `min..=max`
pub(crate) fn draw_size<R: RngCore>(rng: &mut R, min: usize, max: usize) -> usize {
    (rng.next_u32() as usize) % (max - min + 1) + min
}

/// Draw an index in `0..bound`
pub(crate) fn draw_index<R: RngCore>(rng: &mut R, bound: usize) -> usize {
    (rng.next_u32() as usize) % bound
}

/// Allocate, treating lack of space as an ordinary outcome
pub(crate) fn try_allocate<A: BlockAllocator>(
    alloc: &mut A,
    need: usize,
) -> Result<Option<A::Handle>> {
    match alloc.allocate(need) {
        Ok(handle) => Ok(Some(handle)),
        Err(PoolError::OutOfSpace { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
