//! Linked free-list allocator
//!
//! Every block carries a successor link. Free blocks form one singly linked
//! list starting at `free_head`; each live allocation is its own chain whose
//! head is handed back to the caller. Blocks are taken one at a time from the
//! front of the free list (LIFO), so an allocation need not be contiguous.
//!
//! A per-block status array is kept in lock-step with the free list so that
//! [`BlockAllocator::state`] is O(1). [`LinkedListAllocator::verify`] walks the
//! list and every chain to prove the two never disagree.

use crate::allocator::{
    check_block, validate_request, AllocationHandle, BlockAllocator, BlockId, BlockState,
    PoolSnapshot, POOL_BLOCKS,
};
use crate::error::{PoolError, Result};
use serde::{Deserialize, Serialize};

/// Head block of a live allocation chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainHandle(BlockId);

impl ChainHandle {
    pub fn head(&self) -> BlockId {
        self.0
    }
}

impl AllocationHandle for ChainHandle {
    fn first_block(&self) -> BlockId {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockNode {
    /// Stand-in for file data; not interpreted
    payload: String,
    /// Next block in the free list or in the owning chain
    next: Option<BlockId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedListAllocator {
    nodes: Vec<BlockNode>,
    free_head: Option<BlockId>,
    /// Redundant status, true = used
    used: Vec<bool>,
    /// True where a block heads a live allocation
    chain_heads: Vec<bool>,
    free_blocks: usize,
}

impl LinkedListAllocator {
    /// Create a pool with blocks linked 0 -> 1 -> ... -> 63
    pub fn new() -> Self {
        let mut alloc = LinkedListAllocator {
            nodes: Vec::with_capacity(POOL_BLOCKS),
            free_head: None,
            used: vec![false; POOL_BLOCKS],
            chain_heads: vec![false; POOL_BLOCKS],
            free_blocks: POOL_BLOCKS,
        };
        alloc.link_all_free();
        alloc
    }

    fn link_all_free(&mut self) {
        self.nodes = (0..POOL_BLOCKS)
            .map(|block_id| BlockNode {
                payload: format!("block-{}-initial", block_id),
                next: (block_id + 1 < POOL_BLOCKS).then_some(block_id + 1),
            })
            .collect();
        self.free_head = Some(0);
        self.used.iter_mut().for_each(|u| *u = false);
        self.chain_heads.iter_mut().for_each(|h| *h = false);
        self.free_blocks = POOL_BLOCKS;
    }

    /// Pop the head of the free list and detach it
    fn allocate_one(&mut self) -> Option<BlockId> {
        let block_id = self.free_head?;

        self.free_head = self.nodes[block_id].next;
        self.nodes[block_id].next = None;
        self.used[block_id] = true;
        self.free_blocks -= 1;

        Some(block_id)
    }

    /// Push a single block onto the front of the free list
    fn push_free(&mut self, block_id: BlockId) {
        self.nodes[block_id].next = self.free_head;
        self.free_head = Some(block_id);
        self.used[block_id] = false;
        self.free_blocks += 1;
    }

    /// Take `need` blocks, all or nothing
    ///
    /// Blocks are claimed into a scratch list first. If the free list runs
    /// dry part way, the scratch blocks go back in reverse so the free list
    /// is exactly as it was. Only a complete claim is linked into a chain.
    pub fn allocate_chain(&mut self, need: usize) -> Result<ChainHandle> {
        validate_request(need, POOL_BLOCKS)?;

        let mut scratch = Vec::with_capacity(need);
        for _ in 0..need {
            match self.allocate_one() {
                Some(block_id) => scratch.push(block_id),
                None => {
                    tracing::debug!(
                        "Free list exhausted after {} of {} blocks, rolling back",
                        scratch.len(),
                        need
                    );
                    for &block_id in scratch.iter().rev() {
                        self.push_free(block_id);
                    }
                    return Err(PoolError::OutOfSpace { need });
                }
            }
        }

        for (position, window) in scratch.windows(2).enumerate() {
            self.nodes[window[0]].next = Some(window[1]);
            self.nodes[window[0]].payload = format!("file-data-{}", position);
        }
        if let Some(&tail) = scratch.last() {
            self.nodes[tail].payload = format!("file-data-{}", need - 1);
        }

        let head = scratch[0];
        self.chain_heads[head] = true;

        tracing::trace!("Allocated chain of {} blocks at head {}", need, head);
        Ok(ChainHandle(head))
    }

    /// Splice a whole chain onto the front of the free list
    pub fn free_chain(&mut self, handle: ChainHandle) -> Result<()> {
        let head = handle.head();
        check_block(head, POOL_BLOCKS)?;

        if !self.chain_heads[head] {
            tracing::warn!("Double-free or stray handle detected for block {}", head);
            return Err(PoolError::InvalidHandle(head));
        }

        let mut tail = head;
        let mut length = 1;
        self.used[tail] = false;
        while let Some(next) = self.nodes[tail].next {
            tail = next;
            length += 1;
            self.used[tail] = false;
        }

        self.nodes[tail].next = self.free_head;
        self.free_head = Some(head);
        self.chain_heads[head] = false;
        self.free_blocks += length;

        tracing::trace!("Freed chain of {} blocks at head {}", length, head);
        Ok(())
    }

    /// Blocks of one live allocation, in link order
    pub fn chain(&self, handle: ChainHandle) -> Result<Vec<BlockId>> {
        let head = handle.head();
        check_block(head, POOL_BLOCKS)?;
        if !self.chain_heads[head] {
            return Err(PoolError::InvalidHandle(head));
        }

        self.walk(Some(head))
    }

    /// Free blocks in list order, head first
    pub fn free_list(&self) -> Result<Vec<BlockId>> {
        self.walk(self.free_head)
    }

    pub fn free_head(&self) -> Option<BlockId> {
        self.free_head
    }

    pub fn payload(&self, block_id: BlockId) -> Result<&str> {
        check_block(block_id, POOL_BLOCKS)?;
        Ok(&self.nodes[block_id].payload)
    }

    /// Answer "is this block free" the slow way, by walking the free list
    pub fn state_by_walk(&self, block_id: BlockId) -> Result<BlockState> {
        check_block(block_id, POOL_BLOCKS)?;
        Ok(if self.free_list()?.contains(&block_id) {
            BlockState::Free
        } else {
            BlockState::Used
        })
    }

    fn walk(&self, start: Option<BlockId>) -> Result<Vec<BlockId>> {
        let mut blocks = Vec::new();
        let mut current = start;

        while let Some(block_id) = current {
            if blocks.len() >= POOL_BLOCKS {
                return Err(PoolError::Corrupted(format!(
                    "cycle detected in list starting at block {:?}",
                    start
                )));
            }
            blocks.push(block_id);
            current = self.nodes[block_id].next;
        }

        Ok(blocks)
    }

    /// Check the free list, every chain and the status array against each other
    ///
    /// Every block must be reachable exactly once: either from the free list
    /// (status free) or from exactly one chain head (status used).
    pub fn verify(&self) -> Result<()> {
        let mut seen = vec![false; POOL_BLOCKS];

        let free = self.free_list()?;
        for &block_id in &free {
            if seen[block_id] {
                return Err(PoolError::Corrupted(format!(
                    "block {} appears twice in the free list",
                    block_id
                )));
            }
            if self.used[block_id] {
                return Err(PoolError::Corrupted(format!(
                    "block {} is on the free list but marked used",
                    block_id
                )));
            }
            seen[block_id] = true;
        }

        if free.len() != self.free_blocks {
            return Err(PoolError::Corrupted(format!(
                "free list holds {} blocks, counter says {}",
                free.len(),
                self.free_blocks
            )));
        }

        for head in (0..POOL_BLOCKS).filter(|&b| self.chain_heads[b]) {
            for block_id in self.walk(Some(head))? {
                if seen[block_id] {
                    return Err(PoolError::Corrupted(format!(
                        "block {} is claimed twice (chain head {})",
                        block_id, head
                    )));
                }
                if !self.used[block_id] {
                    return Err(PoolError::Corrupted(format!(
                        "block {} is in chain {} but marked free",
                        block_id, head
                    )));
                }
                seen[block_id] = true;
            }
        }

        if let Some(lost) = seen.iter().position(|&s| !s) {
            return Err(PoolError::Corrupted(format!(
                "block {} is neither free nor in a live chain",
                lost
            )));
        }

        Ok(())
    }
}

impl Default for LinkedListAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockAllocator for LinkedListAllocator {
    type Handle = ChainHandle;

    fn name(&self) -> &'static str {
        "linked-list"
    }

    fn reset(&mut self) {
        self.link_all_free();
    }

    fn allocate(&mut self, need: usize) -> Result<ChainHandle> {
        self.allocate_chain(need)
    }

    fn free(&mut self, handle: ChainHandle) -> Result<()> {
        self.free_chain(handle)
    }

    fn state(&self, block_id: BlockId) -> Result<BlockState> {
        check_block(block_id, POOL_BLOCKS)?;
        Ok(if self.used[block_id] {
            BlockState::Used
        } else {
            BlockState::Free
        })
    }

    fn dump(&self) -> PoolSnapshot {
        PoolSnapshot::new(
            self.used
                .iter()
                .map(|&used| if used { BlockState::Used } else { BlockState::Free })
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
