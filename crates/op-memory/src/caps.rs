//! Memory capability flags and pool identities

use bitflags::bitflags;

bitflags! {
    /// Capability requirements for an allocation request
    ///
    /// Flags compose by union; the returned block must satisfy every
    /// requested flag. An empty mask means "no preference".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemCaps: u32 {
        /// Slow expansion memory
        const SLOW      = 0b0000_0001;
        /// Fast tightly-coupled memory
        const FAST      = 0b0000_0010;
        /// Reachable by the DMA engine
        const DMA       = 0b0000_0100;
        /// Byte-addressable
        const MEM_8BIT  = 0b0000_1000;
        /// 32-bit aligned access
        const MEM_32BIT = 0b0001_0000;
    }
}

impl MemCaps {
    /// No preference; any pool may serve the request
    pub const ANY: MemCaps = MemCaps::empty();
}

/// Physical pool identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// On-die SRAM: fast, DMA-capable
    Internal,
    /// Expansion PSRAM: large but slow, not DMA-reachable
    External,
}

impl PoolKind {
    /// Capabilities this pool advertises
    ///
    /// A pool is a candidate for a request iff its advertised set contains
    /// every requested flag. This is the whole pool-selection decision
    /// table; there is no fallthrough anywhere else.
    pub fn advertised(&self) -> MemCaps {
        match self {
            Self::Internal => MemCaps::FAST | MemCaps::DMA | MemCaps::MEM_8BIT | MemCaps::MEM_32BIT,
            Self::External => MemCaps::SLOW | MemCaps::MEM_8BIT | MemCaps::MEM_32BIT,
        }
    }

    /// Get pool name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}
