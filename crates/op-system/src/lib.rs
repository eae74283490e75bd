//! System-management core for the oxidized-pocket handheld firmware
//!
//! This crate mediates between the running application, the hardware
//! platform, and shared peripherals: lifecycle transitions, SPI bus
//! arbitration, capability-aware allocation, crash recovery, and runtime
//! telemetry.

pub mod app;
pub mod average;
pub mod host;
pub mod panic;
pub mod platform;
pub mod spi;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testutil;

pub use app::{
    system, AppDescriptor, RuntimeStats, StartAction, SystemManager, SystemState,
};
pub use average::MovingAverage;
pub use host::HostPlatform;
pub use panic::{
    FaultCode, PanicRecorder, PanicReport, PanicTrace, TRACE_DEPTH, TRACE_MAGIC, TRACE_TEXT_LEN,
};
pub use platform::{BatteryState, Platform};
pub use spi::{SpiBus, SpiDevice};
pub use telemetry::{FrameStats, RuntimeCounters, Telemetry};

/// Frame duration in microseconds at a given refresh rate
pub fn frame_time_us(refresh_rate: u32) -> u64 {
    1_000_000 / refresh_rate.max(1) as u64
}

/// Funnel a fatal condition into the system panic path.
///
/// Requires an initialized system core; never returns.
#[macro_export]
macro_rules! fatal {
    ($reason:expr) => {
        $crate::app::system().panic($reason, module_path!(), file!())
    };
}
