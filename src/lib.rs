//! # blockpool - Bitmap vs Linked-List Block Allocation
//!
//! `blockpool-rs` simulates a 64-block disk and two classic ways of tracking
//! which blocks are in use:
//!
//! - **Bitmap**: one bit per block, first-fit scan for a contiguous run
//! - **Linked free list**: free blocks threaded through successor links,
//!   allocations built block by block with all-or-nothing rollback
//!
//! Both implement [`BlockAllocator`], so the trace, fragmentation and speed
//! workloads in [`workload`] run unchanged against either one.
//!
//! ## Quick Start
//!
//! ```rust
//! use blockpool_rs::{BitmapAllocator, BlockAllocator, LinkedListAllocator, Result};
//!
//! # fn main() -> Result<()> {
//! let mut bitmap = BitmapAllocator::new();
//! let first = bitmap.allocate(12)?;
//! let second = bitmap.allocate(5)?;
//! assert_eq!((first.start, second.start), (0, 12));
//!
//! // Freed space is found again by the first-fit scan
//! bitmap.free(first)?;
//! assert_eq!(bitmap.allocate(20)?.start, 17);
//!
//! let mut linked = LinkedListAllocator::new();
//! let chain = linked.allocate(3)?;
//! assert_eq!(linked.chain(chain)?, vec![0, 1, 2]);
//! linked.free(chain)?;
//! linked.verify()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Workloads
//!
//! ```rust
//! use blockpool_rs::workload::run_fragmentation;
//! use blockpool_rs::{BitmapAllocator, SimulationConfig};
//!
//! let config = SimulationConfig::default();
//! let mut bitmap = BitmapAllocator::new();
//! let report = run_fragmentation(
//!     &mut bitmap,
//!     &config.fragmentation,
//!     config.seeds.bitmap.fragmentation,
//! )
//! .unwrap();
//! println!("large file placed: {}", report.large_file_allocated());
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod rng;
pub mod workload;

pub use crate::allocator::{
    bitmap::BitmapAllocator,
    linked_list::{ChainHandle, LinkedListAllocator},
    AllocationHandle, BlockAllocator, BlockId, BlockState, Extent, PoolSnapshot, POOL_BLOCKS,
};
pub use crate::config::SimulationConfig;
pub use crate::error::{PoolError, Result};
pub use crate::rng::LibcRand;
