//! Application-registered save/load handlers

use op_core::error::StateError;
use std::path::Path;
use std::sync::Arc;

/// Save or load callback registered by the running application.
///
/// The handler receives the resolved file path and reports success. What it
/// writes there is entirely its own business; the core offers no
/// partial-write guarantees beyond the handler's own.
pub type StateHandler = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Netplay event callback. Stored on the descriptor at registration time
/// and invoked only by the networking collaborator.
pub type NetplayCallback = Arc<dyn Fn(i32) + Send + Sync>;

/// Run a registered handler against a resolved path
pub fn invoke_handler(
    handler: Option<&StateHandler>,
    path: &Path,
) -> Result<(), StateError> {
    let handler = handler.ok_or(StateError::NoHandler)?;
    if handler(path) {
        Ok(())
    } else {
        tracing::warn!(path = %path.display(), "state handler reported failure");
        Err(StateError::HandlerFailed(path.to_path_buf()))
    }
}
