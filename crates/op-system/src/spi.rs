//! SPI bus arbitration
//!
//! Storage and display hardware share one physical SPI bus; interleaved
//! transactions from different threads corrupt both. The arbiter hands the
//! bus to at most one device at a time and lets the owning thread nest
//! acquisitions.

use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};

/// Peripheral classes sharing the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpiDevice {
    /// Bus-neutral operation; never takes ownership
    Any,
    /// SD-card storage
    Storage,
    /// LCD display
    Display,
}

#[derive(Debug, Clone, Copy)]
struct Owner {
    device: SpiDevice,
    thread: ThreadId,
    depth: u32,
}

#[derive(Debug, Default)]
struct SpiState {
    owner: Option<Owner>,
}

/// Mutual exclusion over the shared bus
pub struct SpiBus {
    state: Mutex<SpiState>,
    freed: Condvar,
}

impl SpiBus {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SpiState::default()),
            freed: Condvar::new(),
        }
    }

    /// Take the bus for `device`, blocking until it is available.
    ///
    /// A thread that already owns the bus for the same device re-acquires
    /// it without blocking. `Any` returns immediately and leaves ownership
    /// untouched; it exists so bus-neutral transfers can use the same
    /// bracketing idiom.
    pub fn acquire(&self, device: SpiDevice) {
        if device == SpiDevice::Any {
            return;
        }

        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            match &mut state.owner {
                None => {
                    state.owner = Some(Owner {
                        device,
                        thread: me,
                        depth: 1,
                    });
                    return;
                }
                Some(owner) if owner.thread == me && owner.device == device => {
                    owner.depth += 1;
                    return;
                }
                Some(_) => {}
            }
            self.freed.wait(&mut state);
        }
    }

    /// Release one level of a prior `acquire`.
    ///
    /// Acquisitions and releases form a stack per thread; releasing out of
    /// order or without a matching acquire is a contract violation, caught
    /// by debug assertions only.
    pub fn release(&self, device: SpiDevice) {
        if device == SpiDevice::Any {
            return;
        }

        let me = thread::current().id();
        let mut state = self.state.lock();
        match &mut state.owner {
            Some(owner) if owner.thread == me && owner.device == device => {
                owner.depth -= 1;
                if owner.depth == 0 {
                    state.owner = None;
                    self.freed.notify_all();
                }
            }
            _ => debug_assert!(false, "release without a matching acquire"),
        }
    }

    /// Device currently holding the bus, if any
    pub fn holder(&self) -> Option<SpiDevice> {
        self.state.lock().owner.map(|o| o.device)
    }
}

impl Default for SpiBus {
    fn default() -> Self {
        Self::new()
    }
}
