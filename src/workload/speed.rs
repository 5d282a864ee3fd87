//! Speed test: fill the pool with random-size files, drain it, repeat

use crate::allocator::BlockAllocator;
use crate::config::SpeedConfig;
use crate::error::Result;
use crate::rng::LibcRand;
use crate::workload::{draw_size, try_allocate};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedReport {
    pub allocator: String,
    pub iterations: u32,
    pub files_per_iteration: usize,
    pub successful_allocations: usize,
    pub failed_allocations: usize,
    /// Allocation attempts plus frees, counted the classic way (2 per file)
    pub operations: u64,
    pub elapsed: Duration,
}

impl SpeedReport {
    pub fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.operations as f64 / secs
    }

    pub fn mean_op_micros(&self) -> f64 {
        if self.operations == 0 {
            return 0.0;
        }
        self.elapsed.as_secs_f64() * 1_000_000.0 / self.operations as f64
    }
}

/// Run the speed test with the glibc-compatible generator
pub fn run_speed<A: BlockAllocator>(
    alloc: &mut A,
    config: &SpeedConfig,
    seed_multiplier: u32,
) -> Result<SpeedReport> {
    run_speed_with::<A, LibcRand>(alloc, config, seed_multiplier)
}

/// Run the speed test with any seedable generator
///
/// Iteration `i` resets the pool and reseeds with `i * seed_multiplier`.
pub fn run_speed_with<A, R>(
    alloc: &mut A,
    config: &SpeedConfig,
    seed_multiplier: u32,
) -> Result<SpeedReport>
where
    A: BlockAllocator,
    R: RngCore + SeedableRng,
{
    config.validate()?;
    info!(
        "Running {} speed test ({} iterations x {} files)",
        alloc.name(),
        config.iterations,
        config.files_per_iteration
    );

    let mut successful_allocations = 0;
    let mut failed_allocations = 0;
    let mut handles = Vec::with_capacity(config.files_per_iteration);

    let started = Instant::now();
    for iteration in 0..config.iterations {
        alloc.reset();
        let mut rng = R::seed_from_u64(u64::from(iteration.wrapping_mul(seed_multiplier)));

        for _ in 0..config.files_per_iteration {
            let blocks = draw_size(&mut rng, config.min_file_blocks, config.max_file_blocks);
            match try_allocate(alloc, blocks)? {
                Some(handle) => {
                    successful_allocations += 1;
                    handles.push(handle);
                }
                None => failed_allocations += 1,
            }
        }

        for handle in handles.drain(..) {
            alloc.free(handle)?;
        }
    }
    let elapsed = started.elapsed();

    let report = SpeedReport {
        allocator: alloc.name().to_string(),
        iterations: config.iterations,
        files_per_iteration: config.files_per_iteration,
        successful_allocations,
        failed_allocations,
        operations: u64::from(config.iterations) * config.files_per_iteration as u64 * 2,
        elapsed,
    };

    info!(
        "{} speed test finished in {:?} ({:.0} ops/sec)",
        report.allocator,
        report.elapsed,
        report.ops_per_sec()
    );

    Ok(report)
}
