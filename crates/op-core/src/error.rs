//! Error types for the oxidized-pocket firmware

use thiserror::Error;

/// Main error type for the firmware core
#[derive(Error, Debug)]
pub enum SystemError {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Application not found: {0}")]
    AppNotFound(String),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

/// Memory-pool errors
///
/// Exhaustion is reported as a value here; the lifecycle manager turns it
/// into the fatal panic path so callers of its allocation entry point never
/// see it.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("No pool satisfies capabilities 0x{caps:02x} for {size} bytes")]
    Exhausted { size: usize, caps: u32 },

    #[error("Backing region of {0} bytes could not be reserved")]
    RegionUnavailable(usize),
}

/// Save/load state errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("No application is running")]
    NoApp,

    #[error("No state handler registered")]
    NoHandler,

    #[error("State handler failed for {0}")]
    HandlerFailed(std::path::PathBuf),

    #[error("Invalid save slot: {0}")]
    InvalidSlot(u8),
}

/// Result type alias for firmware operations
pub type Result<T> = std::result::Result<T, SystemError>;
