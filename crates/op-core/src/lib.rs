//! Core types for the oxidized-pocket handheld firmware
//!
//! This crate provides the foundational types, error handling,
//! configuration, and logging infrastructure for the firmware.

pub mod config;
pub mod error;
pub mod logging;

pub use config::SystemConfig;
pub use error::{MemoryError, Result, StateError, SystemError};
