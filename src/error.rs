use crate::allocator::BlockId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Invalid request: cannot allocate {need} blocks from a pool of {capacity}")]
    InvalidRequest { need: usize, capacity: usize },

    #[error("Out of space: no room for {need} blocks")]
    OutOfSpace { need: usize },

    #[error("Invalid block ID: {0}")]
    InvalidBlockId(BlockId),

    #[error("Invalid handle: block {0} does not start a live allocation")]
    InvalidHandle(BlockId),

    #[error("Pool state corrupted: {0}")]
    Corrupted(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PoolError>;
