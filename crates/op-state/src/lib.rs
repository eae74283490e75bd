//! Save-state path resolution for the oxidized-pocket firmware
//!
//! Maps a (path kind, content identity) pair to a canonical filesystem path
//! and carries the handler types applications register for save and load.

pub mod handler;
pub mod paths;

pub use handler::{invoke_handler, NetplayCallback, StateHandler};
pub use paths::{PathKind, StatePaths};
