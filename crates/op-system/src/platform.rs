//! Hardware platform seam
//!
//! Everything the system core needs from the underlying board and its
//! drivers, behind one trait so the core stays testable off-target.

use crate::panic::PanicTrace;
use std::ptr::NonNull;

/// Battery charge snapshot, as reported by the power driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatteryState {
    /// Remaining charge, 0..=100
    pub percent: u8,
    /// Cell voltage
    pub millivolts: u16,
    /// Charger attached
    pub charging: bool,
}

/// Board services consumed by the system core.
///
/// The power transitions never return: the platform performs a reset or
/// enters a low-power mode and the current process image ends there.
pub trait Platform: Send + Sync {
    /// Monotonic microseconds since boot
    fn elapsed_us(&self) -> u64;

    /// Current battery state
    fn battery(&self) -> BatteryState;

    /// Cumulative idle time per processing core, in microseconds
    fn idle_times(&self) -> [u64; 2];

    /// Render a modal dialog synchronously
    fn show_dialog(&self, title: &str, body: &str);

    /// Read a persisted named setting
    fn read_setting(&self, key: &str) -> Option<String>;

    /// Write a persisted named setting
    fn write_setting(&self, key: &str, value: &str);

    /// Drive the status LED
    fn set_led(&self, on: bool);

    /// The reset-surviving region holding the panic trace.
    ///
    /// Must stay valid for the life of the process, outside the normal
    /// heap, and untouched by the platform's reset-time memory clearing.
    fn retained_trace(&self) -> NonNull<PanicTrace>;

    /// Walk the current call stack into `frames`.
    ///
    /// Returns the number of return addresses written. Stops at the first
    /// null return address or when `frames` is full, whichever comes first.
    /// Must not allocate.
    fn capture_backtrace(&self, frames: &mut [u32]) -> usize;

    /// Soft reset into a fresh boot
    fn restart(&self) -> !;

    /// Unconditional stop
    fn halt(&self) -> !;

    /// Enter the low-power path; wakes up as a fresh boot
    fn sleep(&self) -> !;
}
