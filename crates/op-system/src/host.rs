//! Host platform backend
//!
//! Std-based implementation of [`Platform`] for running the system core on
//! a development machine: a monotonic `Instant` clock, settings persisted
//! as JSON, dialogs rendered through the log, and power transitions mapped
//! to process exit. The retained region is a leaked allocation, so a soft
//! reset is modelled by building a new system over the same platform
//! within one process.

use crate::panic::PanicTrace;
use crate::platform::{BatteryState, Platform};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::time::Instant;

pub struct HostPlatform {
    start: Instant,
    settings_path: PathBuf,
    settings: Mutex<HashMap<String, String>>,
    region: NonNull<PanicTrace>,
}

// Safety: the retained region is leaked at construction and owned solely
// by this platform instance; settings are behind a lock.
unsafe impl Send for HostPlatform {}
unsafe impl Sync for HostPlatform {}

impl HostPlatform {
    /// Create a host platform persisting settings under `data_dir`
    pub fn new(data_dir: &Path) -> Self {
        let settings_path = data_dir.join("settings.json");
        let settings = std::fs::read_to_string(&settings_path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        let region: &'static mut PanicTrace = Box::leak(Box::new(bytemuck::Zeroable::zeroed()));

        Self {
            start: Instant::now(),
            settings_path,
            settings: Mutex::new(settings),
            region: NonNull::from(region),
        }
    }

    fn persist(&self, settings: &HashMap<String, String>) {
        if let Some(parent) = self.settings_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(settings) {
            Ok(content) => {
                if let Err(err) = std::fs::write(&self.settings_path, content) {
                    tracing::warn!(%err, "failed to persist settings");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to encode settings"),
        }
    }
}

impl Platform for HostPlatform {
    fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    fn battery(&self) -> BatteryState {
        // No battery on the host; report a full, charging cell
        BatteryState {
            percent: 100,
            millivolts: 4200,
            charging: true,
        }
    }

    fn idle_times(&self) -> [u64; 2] {
        [0, 0]
    }

    fn show_dialog(&self, title: &str, body: &str) {
        tracing::warn!(title, body, "dialog");
    }

    fn read_setting(&self, key: &str) -> Option<String> {
        self.settings.lock().get(key).cloned()
    }

    fn write_setting(&self, key: &str, value: &str) {
        let mut settings = self.settings.lock();
        settings.insert(key.to_string(), value.to_string());
        self.persist(&settings);
    }

    fn set_led(&self, on: bool) {
        tracing::debug!(on, "led");
    }

    fn retained_trace(&self) -> NonNull<PanicTrace> {
        self.region
    }

    fn capture_backtrace(&self, _frames: &mut [u32]) -> usize {
        // No 32-bit return-address walker on the host; the text fields
        // still identify the fault
        0
    }

    fn restart(&self) -> ! {
        tracing::info!("host restart requested, exiting");
        std::process::exit(0)
    }

    fn halt(&self) -> ! {
        tracing::info!("host halt requested, exiting");
        std::process::exit(0)
    }

    fn sleep(&self) -> ! {
        tracing::info!("host sleep requested, exiting");
        std::process::exit(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let platform = HostPlatform::new(dir.path());
        assert_eq!(platform.read_setting("boot.app"), None);
        platform.write_setting("boot.app", "gb-emu");
        drop(platform);

        let reloaded = HostPlatform::new(dir.path());
        assert_eq!(reloaded.read_setting("boot.app").as_deref(), Some("gb-emu"));
    }

    #[test]
    fn test_clock_is_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let platform = HostPlatform::new(dir.path());
        let a = platform.elapsed_us();
        let b = platform.elapsed_us();
        assert!(b >= a);
    }
}
