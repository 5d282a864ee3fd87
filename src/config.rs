//! Workload configuration
//!
//! Defaults reproduce the parameters of the classic bitmap vs linked-list
//! homework runs. Any field may be overridden from a TOML file:
//!
//! ```toml
//! [fragmentation]
//! files = 30
//! large_file_blocks = 16
//!
//! [seeds.bitmap]
//! fragmentation = 7
//! ```

use crate::allocator::POOL_BLOCKS;
use crate::error::{PoolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub trace: TraceConfig,
    pub fragmentation: FragmentationConfig,
    pub speed: SpeedConfig,
    pub seeds: SeedConfig,
}

/// Fixed request sequence replayed against a fresh pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub sequence: Vec<usize>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            sequence: vec![2, 3, 5, 2, 4, 6, 1, 3, 5, 2, 4, 3, 2, 1, 5],
        }
    }
}

/// Create files, delete some at random, then try one large allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentationConfig {
    pub files: usize,
    pub min_file_blocks: usize,
    pub max_file_blocks: usize,
    pub deletions: usize,
    pub large_file_blocks: usize,
}

impl Default for FragmentationConfig {
    fn default() -> Self {
        FragmentationConfig {
            files: 20,
            min_file_blocks: 1,
            max_file_blocks: 5,
            deletions: 5,
            large_file_blocks: 12,
        }
    }
}

/// Repeated fill-then-drain cycles, timed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub iterations: u32,
    pub files_per_iteration: usize,
    pub min_file_blocks: usize,
    pub max_file_blocks: usize,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        SpeedConfig {
            iterations: 100,
            files_per_iteration: 100,
            min_file_blocks: 1,
            max_file_blocks: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPair {
    /// Seed for the fragmentation scenario
    pub fragmentation: u32,
    /// Speed iteration `i` is seeded with `i * speed_multiplier`
    pub speed_multiplier: u32,
}

impl SeedPair {
    pub fn bitmap() -> Self {
        SeedPair {
            fragmentation: 999,
            speed_multiplier: 123,
        }
    }

    pub fn linked_list() -> Self {
        SeedPair {
            fragmentation: 888,
            speed_multiplier: 456,
        }
    }
}

/// Per-allocator seeds
///
/// A partial table only overrides the fields it names; the rest keep that
/// allocator's own defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SeedOverrides")]
pub struct SeedConfig {
    pub bitmap: SeedPair,
    pub linked_list: SeedPair,
}

impl Default for SeedConfig {
    fn default() -> Self {
        SeedConfig {
            bitmap: SeedPair::bitmap(),
            linked_list: SeedPair::linked_list(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SeedOverrides {
    bitmap: SeedPairOverride,
    linked_list: SeedPairOverride,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SeedPairOverride {
    fragmentation: Option<u32>,
    speed_multiplier: Option<u32>,
}

impl SeedPairOverride {
    fn apply(self, base: SeedPair) -> SeedPair {
        SeedPair {
            fragmentation: self.fragmentation.unwrap_or(base.fragmentation),
            speed_multiplier: self.speed_multiplier.unwrap_or(base.speed_multiplier),
        }
    }
}

impl From<SeedOverrides> for SeedConfig {
    fn from(overrides: SeedOverrides) -> Self {
        SeedConfig {
            bitmap: overrides.bitmap.apply(SeedPair::bitmap()),
            linked_list: overrides.linked_list.apply(SeedPair::linked_list()),
        }
    }
}

impl TraceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sequence.is_empty() {
            return Err(invalid("trace.sequence must not be empty"));
        }
        for &need in &self.sequence {
            check_size("trace.sequence entry", need)?;
        }
        Ok(())
    }
}

impl FragmentationConfig {
    /// Checked by the scenario itself before it touches the pool
    pub fn validate(&self) -> Result<()> {
        if self.files == 0 {
            return Err(invalid("fragmentation.files must be at least 1"));
        }
        check_range("fragmentation", self.min_file_blocks, self.max_file_blocks)?;
        check_size("fragmentation.large_file_blocks", self.large_file_blocks)
    }
}

impl SpeedConfig {
    /// Checked by the speed test itself before it touches the pool
    pub fn validate(&self) -> Result<()> {
        if self.iterations == 0 {
            return Err(invalid("speed.iterations must be at least 1"));
        }
        if self.files_per_iteration == 0 {
            return Err(invalid("speed.files_per_iteration must be at least 1"));
        }
        check_range("speed", self.min_file_blocks, self.max_file_blocks)
    }
}

impl SimulationConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading simulation config from {:?}", path);
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PoolError::InvalidConfig(e.to_string()))
    }

    /// Validate all sections
    ///
    /// Checks:
    /// - Every requested size fits the pool (`1..=POOL_BLOCKS`)
    /// - Size ranges are ordered
    /// - Counts are non-zero
    pub fn validate(&self) -> Result<()> {
        self.trace.validate()?;
        self.fragmentation.validate()?;
        self.speed.validate()
    }
}

fn invalid(message: impl Into<String>) -> PoolError {
    PoolError::InvalidConfig(message.into())
}

fn check_size(field: &str, blocks: usize) -> Result<()> {
    if blocks == 0 || blocks > POOL_BLOCKS {
        return Err(invalid(format!(
            "{} is {}, must be within 1..={}",
            field, blocks, POOL_BLOCKS
        )));
    }
    Ok(())
}

fn check_range(section: &str, min: usize, max: usize) -> Result<()> {
    check_size(&format!("{}.min_file_blocks", section), min)?;
    check_size(&format!("{}.max_file_blocks", section), max)?;
    if min > max {
        return Err(invalid(format!(
            "{}.min_file_blocks ({}) exceeds max_file_blocks ({})",
            section, min, max
        )));
    }
    Ok(())
}
