//! Seeded workloads replay the classic C runs exactly
//!
//! Expected values come from `srand(seed)` / `rand() % n` on glibc.

use blockpool_rs::config::{FragmentationConfig, SpeedConfig};
use blockpool_rs::workload::{run_fragmentation, run_speed, run_trace, DeletionOutcome};
use blockpool_rs::{BitmapAllocator, BlockAllocator, LinkedListAllocator, SimulationConfig};

const TRACE_STARTS: [usize; 15] = [0, 2, 5, 10, 12, 16, 22, 23, 26, 31, 33, 37, 40, 42, 43];

#[test]
fn test_trace_matches_for_both_allocators() {
    let config = SimulationConfig::default();

    let mut bitmap = BitmapAllocator::new();
    let mut linked = LinkedListAllocator::new();
    let bitmap_trace = run_trace(&mut bitmap, &config.trace.sequence).unwrap();
    let linked_trace = run_trace(&mut linked, &config.trace.sequence).unwrap();

    let starts: Vec<_> = bitmap_trace
        .steps
        .iter()
        .map(|s| s.first_block.unwrap())
        .collect();
    assert_eq!(starts, TRACE_STARTS);

    let expected_final = format!("{}{}", "1".repeat(48), "0".repeat(16));
    assert_eq!(
        bitmap_trace.final_snapshot().unwrap().to_string(),
        expected_final
    );

    // From an empty pool the free list hands out blocks in ascending order
    for (b, l) in bitmap_trace.steps.iter().zip(&linked_trace.steps) {
        assert_eq!(b.first_block, l.first_block);
        assert_eq!(b.snapshot, l.snapshot);
    }
}

#[test]
fn test_bitmap_fragmentation_seed_999() {
    let config = FragmentationConfig::default();
    let mut alloc = BitmapAllocator::new();
    let report = run_fragmentation(&mut alloc, &config, 999).unwrap();

    let sizes: Vec<_> = report.files.iter().map(|f| f.blocks).collect();
    assert_eq!(
        sizes,
        vec![3, 3, 2, 2, 4, 1, 3, 4, 2, 3, 3, 4, 3, 4, 4, 3, 1, 3, 1, 1]
    );
    let starts: Vec<_> = report.files.iter().map(|f| f.first_block.unwrap()).collect();
    assert_eq!(
        starts,
        vec![0, 3, 6, 8, 10, 14, 15, 18, 22, 24, 27, 30, 34, 37, 41, 45, 48, 49, 52, 53]
    );

    let deleted: Vec<_> = report.deletions.iter().map(|d| d.file).collect();
    assert_eq!(deleted, vec![13, 12, 3, 6, 16]);
    assert!(report
        .deletions
        .iter()
        .all(|d| d.outcome == DeletionOutcome::Freed));

    // 23 blocks free, but the longest run is the 10-block tail
    assert_eq!(report.free_blocks_before_large, 23);
    assert_eq!(report.largest_free_run_before_large, 10);
    assert!(!report.large_file_allocated());
    assert_eq!(
        report.snapshot.to_string(),
        "1111111100111110001111111111111111000000011111110111110000000000"
    );

    assert_eq!(alloc.free_blocks(), 64);
}

#[test]
fn test_linked_list_fragmentation_seed_888() {
    let config = FragmentationConfig::default();
    let mut alloc = LinkedListAllocator::new();
    let report = run_fragmentation(&mut alloc, &config, 888).unwrap();

    let sizes: Vec<_> = report.files.iter().map(|f| f.blocks).collect();
    assert_eq!(
        sizes,
        vec![1, 4, 4, 2, 4, 3, 3, 2, 1, 1, 5, 5, 3, 4, 1, 4, 3, 2, 5, 1]
    );

    let deleted: Vec<_> = report.deletions.iter().map(|d| d.file).collect();
    assert_eq!(deleted, vec![3, 2, 5, 6, 19]);
    assert_eq!(report.blocks_freed(), 2 + 4 + 3 + 3 + 1);

    // Non-contiguous space is enough for the linked list
    assert_eq!(report.free_blocks_before_large, 19);
    assert_eq!(report.largest_free_run_before_large, 7);
    assert_eq!(report.large_file_start, Some(57));
    assert_eq!(
        report.snapshot.to_string(),
        "1111111111011111111111111111111111111111111111111111111111000000"
    );

    alloc.verify().unwrap();
    assert_eq!(alloc.free_blocks(), 64);
}

#[test]
fn test_large_file_chain_follows_lifo_order() {
    let config = FragmentationConfig::default();
    let mut alloc = LinkedListAllocator::new();
    let report = run_fragmentation(&mut alloc, &config, 888).unwrap();

    // Replay the recorded files and deletions by hand to inspect the large chain
    let mut replay = LinkedListAllocator::new();
    let mut handles = Vec::new();
    for file in &report.files {
        handles.push(replay.allocate(file.blocks).unwrap());
    }
    for deletion in &report.deletions {
        replay.free(handles[deletion.file]).unwrap();
    }
    let large = replay.allocate(12).unwrap();
    assert_eq!(
        replay.chain(large).unwrap(),
        vec![57, 18, 19, 20, 15, 16, 17, 5, 6, 7, 8, 9]
    );
}

#[test]
fn test_same_seed_same_logical_outcome() {
    let config = FragmentationConfig::default();

    for seed in [888, 999] {
        let mut bitmap = BitmapAllocator::new();
        let mut linked = LinkedListAllocator::new();
        let b = run_fragmentation(&mut bitmap, &config, seed).unwrap();
        let l = run_fragmentation(&mut linked, &config, seed).unwrap();

        assert_eq!(b.files, l.files);
        assert_eq!(b.deletions, l.deletions);
        assert_eq!(b.free_blocks_before_large, l.free_blocks_before_large);
        assert_eq!(
            b.largest_free_run_before_large,
            l.largest_free_run_before_large
        );

        // Only the bitmap needs the 12 blocks to be contiguous
        assert!(!b.large_file_allocated());
        assert!(l.large_file_allocated());
    }
}

#[test]
fn test_fragmentation_is_reproducible() {
    let config = FragmentationConfig::default();
    let mut alloc = BitmapAllocator::new();

    let first = run_fragmentation(&mut alloc, &config, 999).unwrap();
    let second = run_fragmentation(&mut alloc, &config, 999).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_speed_counts_match_classic_runs() {
    let config = SpeedConfig::default();

    let mut bitmap = BitmapAllocator::new();
    let report = run_speed(&mut bitmap, &config, 123).unwrap();
    assert_eq!(report.successful_allocations, 2214);
    assert_eq!(report.failed_allocations, 7786);
    assert_eq!(report.operations, 20_000);

    let mut linked = LinkedListAllocator::new();
    let report = run_speed(&mut linked, &config, 456).unwrap();
    assert_eq!(report.successful_allocations, 2226);
    assert_eq!(report.failed_allocations, 7774);
    linked.verify().unwrap();
}

#[test]
fn test_speed_outcomes_agree_across_allocators() {
    // Within one iteration nothing is freed, so both pools fail on the same requests
    let config = SpeedConfig {
        iterations: 20,
        ..SpeedConfig::default()
    };

    let mut bitmap = BitmapAllocator::new();
    let mut linked = LinkedListAllocator::new();
    let b = run_speed(&mut bitmap, &config, 77).unwrap();
    let l = run_speed(&mut linked, &config, 77).unwrap();

    assert_eq!(b.successful_allocations, l.successful_allocations);
    assert_eq!(b.failed_allocations, l.failed_allocations);
}
