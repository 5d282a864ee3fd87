//! Allocation trace: replay a fixed request sequence from an empty pool

use crate::allocator::{AllocationHandle, BlockAllocator, BlockId, PoolSnapshot};
use crate::error::Result;
use crate::workload::try_allocate;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    /// 1-based step number
    pub step: usize,
    pub need: usize,
    /// `None` when the request could not be satisfied
    pub first_block: Option<BlockId>,
    pub snapshot: PoolSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    pub allocator: String,
    pub steps: Vec<TraceStep>,
}

impl TraceReport {
    pub fn final_snapshot(&self) -> Option<&PoolSnapshot> {
        self.steps.last().map(|step| &step.snapshot)
    }
}

/// Reset the pool and allocate each size in `sequence`, snapshotting as we go
///
/// Allocations are left live; the caller owns the pool afterwards.
pub fn run_trace<A: BlockAllocator>(alloc: &mut A, sequence: &[usize]) -> Result<TraceReport> {
    info!(
        "Running {} allocation trace over {} requests",
        alloc.name(),
        sequence.len()
    );
    alloc.reset();

    let mut steps = Vec::with_capacity(sequence.len());
    for (idx, &need) in sequence.iter().enumerate() {
        let handle = try_allocate(alloc, need)?;
        steps.push(TraceStep {
            step: idx + 1,
            need,
            first_block: handle.map(|h| h.first_block()),
            snapshot: alloc.dump(),
        });
    }

    Ok(TraceReport {
        allocator: alloc.name().to_string(),
        steps,
    })
}
