#![no_main]
use blockpool_rs::{BitmapAllocator, BlockAllocator, LinkedListAllocator, PoolError, POOL_BLOCKS};
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};

#[derive(Debug, Arbitrary)]
enum PoolOp {
    Allocate(u8),
    Free(u8),
    FreeTwice(u8),
    Reset,
}

// Drive both pools with the same op stream; each must conserve blocks and stay self-consistent
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);

    let ops: Vec<PoolOp> = match u.arbitrary() {
        Ok(ops) => ops,
        Err(_) => return,
    };

    let mut bitmap = BitmapAllocator::new();
    let mut linked = LinkedListAllocator::new();
    let mut bitmap_live = Vec::new();
    let mut linked_live = Vec::new();

    for op in ops.iter().take(256) {
        match *op {
            PoolOp::Allocate(need) => {
                let need = usize::from(need);
                match bitmap.allocate(need) {
                    Ok(extent) => bitmap_live.push(extent),
                    Err(PoolError::OutOfSpace { .. }) | Err(PoolError::InvalidRequest { .. }) => {}
                    Err(e) => panic!("bitmap: unexpected {}", e),
                }
                match linked.allocate(need) {
                    Ok(handle) => linked_live.push(handle),
                    Err(PoolError::OutOfSpace { .. }) | Err(PoolError::InvalidRequest { .. }) => {}
                    Err(e) => panic!("linked list: unexpected {}", e),
                }
            }
            PoolOp::Free(idx) => {
                if !bitmap_live.is_empty() {
                    let extent = bitmap_live.swap_remove(usize::from(idx) % bitmap_live.len());
                    bitmap.free(extent).unwrap();
                }
                if !linked_live.is_empty() {
                    let handle = linked_live.swap_remove(usize::from(idx) % linked_live.len());
                    linked.free(handle).unwrap();
                }
            }
            PoolOp::FreeTwice(idx) => {
                if !bitmap_live.is_empty() {
                    let extent = bitmap_live.swap_remove(usize::from(idx) % bitmap_live.len());
                    bitmap.free(extent).unwrap();
                    assert!(bitmap.free(extent).is_err());
                }
                if !linked_live.is_empty() {
                    let handle = linked_live.swap_remove(usize::from(idx) % linked_live.len());
                    linked.free(handle).unwrap();
                    assert!(linked.free(handle).is_err());
                }
            }
            PoolOp::Reset => {
                bitmap.reset();
                linked.reset();
                bitmap_live.clear();
                linked_live.clear();
            }
        }

        let bitmap_held: usize = bitmap_live.iter().map(|e| e.length).sum();
        assert_eq!(bitmap.free_blocks() + bitmap_held, POOL_BLOCKS);
        assert_eq!(bitmap.dump().free_count(), bitmap.free_blocks());
        linked.verify().unwrap();
    }
});
