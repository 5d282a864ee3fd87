//! blockpool CLI
//!
//! Runs the trace, fragmentation and speed workloads against the bitmap
//! and/or linked-list allocators and prints the reports.

use anyhow::{Context, Result};
use blockpool_rs::workload::{
    run_fragmentation, run_speed, run_trace, DeletionOutcome, FragmentationReport, SpeedReport,
    TraceReport,
};
use blockpool_rs::config::SeedPair;
use blockpool_rs::{BitmapAllocator, BlockAllocator, LinkedListAllocator, SimulationConfig};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "blockpool")]
#[command(about = "Bitmap vs linked-list block allocation on a simulated 64-block disk")]
struct Args {
    /// Allocator to exercise (bitmap, linked-list, both) [default: both]
    #[arg(short = 'a', long, default_value = "both")]
    allocator: String,

    /// TOML file overriding workload parameters
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Print reports as JSON instead of text
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Replay the fixed allocation sequence and print the block map per step
    Trace,
    /// Random files, random deletions, then one large allocation
    Fragmentation,
    /// Timed fill/drain cycles
    Speed,
    /// Speed, fragmentation and trace, in that order
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AllocatorChoice {
    Bitmap,
    LinkedList,
    Both,
}

impl AllocatorChoice {
    fn includes_bitmap(self) -> bool {
        matches!(self, AllocatorChoice::Bitmap | AllocatorChoice::Both)
    }

    fn includes_linked_list(self) -> bool {
        matches!(self, AllocatorChoice::LinkedList | AllocatorChoice::Both)
    }
}

/// Parse allocator choice from CLI string
fn parse_allocator(s: &str) -> Result<AllocatorChoice, String> {
    match s.to_lowercase().as_str() {
        "bitmap" => Ok(AllocatorChoice::Bitmap),
        "linked-list" | "linked_list" | "linked" | "list" => Ok(AllocatorChoice::LinkedList),
        "both" | "all" => Ok(AllocatorChoice::Both),
        _ => Err(format!(
            "Invalid allocator '{}'. Valid options: bitmap, linked-list, both",
            s
        )),
    }
}

#[derive(Debug, Default, Serialize)]
struct Reports {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    speed: Vec<SpeedReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fragmentation: Vec<FragmentationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    trace: Vec<TraceReport>,
}

fn run_workloads<A: BlockAllocator>(
    alloc: &mut A,
    command: Command,
    config: &SimulationConfig,
    seeds: SeedPair,
    reports: &mut Reports,
) -> Result<()> {
    if matches!(command, Command::Speed | Command::All) {
        reports
            .speed
            .push(run_speed(alloc, &config.speed, seeds.speed_multiplier)?);
    }
    if matches!(command, Command::Fragmentation | Command::All) {
        reports.fragmentation.push(run_fragmentation(
            alloc,
            &config.fragmentation,
            seeds.fragmentation,
        )?);
    }
    if matches!(command, Command::Trace | Command::All) {
        reports
            .trace
            .push(run_trace(alloc, &config.trace.sequence)?);
    }
    Ok(())
}

fn print_speed(report: &SpeedReport) {
    println!(">>> {} SPEED TEST <<<", report.allocator.to_uppercase());
    println!(
        "{} cycles of {} allocations + frees",
        report.iterations, report.files_per_iteration
    );
    println!("Total time: {:.6} seconds", report.elapsed.as_secs_f64());
    println!("TOTAL operations: {}", report.operations);
    println!(
        "Allocations: {} succeeded, {} failed",
        report.successful_allocations, report.failed_allocations
    );
    println!("Operations per second: {:.0} ops/sec", report.ops_per_sec());
    println!(
        "Average time per operation: {:.3} microseconds\n",
        report.mean_op_micros()
    );
}

fn print_fragmentation(report: &FragmentationReport) {
    println!(
        ">>> {} FRAGMENTATION TEST (seed {}) <<<",
        report.allocator.to_uppercase(),
        report.seed
    );
    println!("Step 1: Creating {} random files...", report.files.len());
    for (idx, file) in report.files.iter().enumerate() {
        match file.first_block {
            Some(start) => println!(" File {}: {} blocks at {}", idx + 1, file.blocks, start),
            None => println!(" File {}: {} blocks, no space", idx + 1, file.blocks),
        }
    }

    println!(
        "Step 2: Randomly deleting {} files...",
        report.deletions.len()
    );
    for deletion in &report.deletions {
        let file = &report.files[deletion.file];
        match deletion.outcome {
            DeletionOutcome::Freed => println!(
                " Deleting file {} (frees up {} blocks)",
                deletion.file + 1,
                file.blocks
            ),
            DeletionOutcome::AlreadyFreed => {
                println!(" File {} already deleted", deletion.file + 1)
            }
            DeletionOutcome::NeverAllocated => {
                println!(" File {} was never allocated", deletion.file + 1)
            }
        }
    }
    println!(
        " {} blocks free, largest contiguous run {}",
        report.free_blocks_before_large, report.largest_free_run_before_large
    );

    println!(
        "Step 3: Trying to allocate a large file ({} blocks)...",
        report.large_file_blocks
    );
    match report.large_file_start {
        Some(start) => println!(" Successful large file allocated starting at block {}", start),
        None => println!(
            " Failed: cannot find {} free blocks",
            report.large_file_blocks
        ),
    }
    println!(" Map: {}\n", report.snapshot);
}

fn print_trace(report: &TraceReport) {
    println!(">>> {} ALLOCATION TRACE <<<", report.allocator.to_uppercase());
    for step in &report.steps {
        let marker = if step.first_block.is_some() { "" } else { " (failed)" };
        println!(
            "After step {:2} (allocate {}): {}{}",
            step.step, step.need, step.snapshot, marker
        );
    }
    println!();
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let choice = parse_allocator(&args.allocator).map_err(anyhow::Error::msg)?;

    let config = match &args.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    info!("Running {:?} with allocator choice {:?}", args.command, choice);

    let mut reports = Reports::default();
    if choice.includes_bitmap() {
        let mut bitmap = BitmapAllocator::new();
        run_workloads(
            &mut bitmap,
            args.command,
            &config,
            config.seeds.bitmap,
            &mut reports,
        )?;
    }
    if choice.includes_linked_list() {
        let mut linked = LinkedListAllocator::new();
        run_workloads(
            &mut linked,
            args.command,
            &config,
            config.seeds.linked_list,
            &mut reports,
        )?;
        linked
            .verify()
            .context("linked-list pool inconsistent after workloads")?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    reports.speed.iter().for_each(print_speed);
    reports.fragmentation.iter().for_each(print_fragmentation);
    reports.trace.iter().for_each(print_trace);
    println!("=== END ===");

    Ok(())
}
