//! Capability-aware memory pools for the oxidized-pocket firmware
//!
//! Allocation requests carry a capability mask and are routed to the first
//! physical pool whose advertised capabilities contain every requested flag.
//! Exhaustion is reported as an error value here; the lifecycle manager is
//! the layer that turns it into a fatal condition.

pub mod caps;
pub mod pool;

pub use caps::{MemCaps, PoolKind};
pub use pool::{MemoryPool, PoolStats, GRANULE};

use op_core::error::MemoryError;
use std::ptr::NonNull;

/// Per-pool occupancy figures, as consumed by the telemetry collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    pub internal: PoolStats,
    pub external: PoolStats,
}

/// The set of physical pools backing the firmware heap
///
/// Pool order encodes the "no preference" policy: unconstrained requests go
/// to external memory first so fast internal memory stays available for
/// callers that need it.
pub struct MemoryPools {
    pools: Vec<MemoryPool>,
}

impl MemoryPools {
    /// Reserve both pools
    pub fn new(internal_size: usize, external_size: usize) -> Result<Self, MemoryError> {
        let pools = vec![
            MemoryPool::new(PoolKind::External, external_size)?,
            MemoryPool::new(PoolKind::Internal, internal_size)?,
        ];
        tracing::info!(
            internal_size,
            external_size,
            "memory pools reserved"
        );
        Ok(Self { pools })
    }

    /// Allocate `size` bytes satisfying every flag in `caps`
    pub fn allocate(&self, size: usize, caps: MemCaps) -> Result<NonNull<u8>, MemoryError> {
        for pool in self.pools.iter().filter(|p| p.advertises(caps)) {
            if let Some(ptr) = pool.allocate(size) {
                tracing::trace!(size, pool = pool.kind().name(), "allocated");
                return Ok(ptr);
            }
        }
        Err(MemoryError::Exhausted {
            size,
            caps: caps.bits(),
        })
    }

    /// Release a block back to its owning pool
    ///
    /// Freeing a pointer that was not returned by [`allocate`], or freeing it
    /// twice, is a contract violation checked by debug assertions only.
    ///
    /// [`allocate`]: Self::allocate
    pub fn free(&self, ptr: NonNull<u8>) {
        for pool in &self.pools {
            if pool.contains(ptr) {
                pool.free(ptr);
                return;
            }
        }
        debug_assert!(false, "freeing a pointer no pool owns");
        tracing::error!(ptr = ?ptr.as_ptr(), "attempted to free a foreign pointer");
    }

    /// Occupancy snapshot of both pools
    pub fn stats(&self) -> MemoryStats {
        let mut stats = MemoryStats::default();
        for pool in &self.pools {
            match pool.kind() {
                PoolKind::Internal => stats.internal = pool.stats(),
                PoolKind::External => stats.external = pool.stats(),
            }
        }
        stats
    }
}
