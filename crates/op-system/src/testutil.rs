//! In-memory platform used by the unit tests

use crate::panic::PanicTrace;
use crate::platform::{BatteryState, Platform};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// Fake board: manual clock, in-memory settings, recorded dialogs, and a
/// leaked retained region so "reboots" (new managers over the same
/// platform) observe the previous trace.
pub(crate) struct TestPlatform {
    clock_us: AtomicU64,
    settings: Mutex<HashMap<String, String>>,
    dialogs: Mutex<Vec<String>>,
    led: AtomicBool,
    frames: Mutex<Vec<u32>>,
    restarts: AtomicU32,
    region: NonNull<PanicTrace>,
}

// Safety: the retained region is leaked and exclusively owned by this
// platform instance; everything else is behind locks or atomics.
unsafe impl Send for TestPlatform {}
unsafe impl Sync for TestPlatform {}

impl TestPlatform {
    pub fn new() -> Arc<Self> {
        let region: &'static mut PanicTrace = Box::leak(Box::new(bytemuck::Zeroable::zeroed()));
        Arc::new(Self {
            clock_us: AtomicU64::new(0),
            settings: Mutex::new(HashMap::new()),
            dialogs: Mutex::new(Vec::new()),
            led: AtomicBool::new(false),
            frames: Mutex::new(Vec::new()),
            restarts: AtomicU32::new(0),
            region: NonNull::from(region),
        })
    }

    pub fn advance(&self, us: u64) {
        self.clock_us.fetch_add(us, Ordering::SeqCst);
    }

    pub fn set_backtrace(&self, frames: &[u32]) {
        *self.frames.lock() = frames.to_vec();
    }

    pub fn dialogs(&self) -> Vec<String> {
        self.dialogs.lock().clone()
    }

    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn setting(&self, key: &str) -> Option<String> {
        self.settings.lock().get(key).cloned()
    }

    pub fn led(&self) -> bool {
        self.led.load(Ordering::SeqCst)
    }
}

impl Platform for TestPlatform {
    fn elapsed_us(&self) -> u64 {
        self.clock_us.load(Ordering::SeqCst)
    }

    fn battery(&self) -> BatteryState {
        BatteryState {
            percent: 80,
            millivolts: 3900,
            charging: false,
        }
    }

    fn idle_times(&self) -> [u64; 2] {
        [1_000, 2_000]
    }

    fn show_dialog(&self, title: &str, body: &str) {
        self.dialogs.lock().push(format!("{title}: {body}"));
    }

    fn read_setting(&self, key: &str) -> Option<String> {
        self.settings.lock().get(key).cloned()
    }

    fn write_setting(&self, key: &str, value: &str) {
        self.settings.lock().insert(key.to_string(), value.to_string());
    }

    fn set_led(&self, on: bool) {
        self.led.store(on, Ordering::SeqCst);
    }

    fn retained_trace(&self) -> NonNull<PanicTrace> {
        self.region
    }

    fn capture_backtrace(&self, frames: &mut [u32]) -> usize {
        let synthetic = self.frames.lock();
        let count = synthetic.len().min(frames.len());
        frames[..count].copy_from_slice(&synthetic[..count]);
        count
    }

    fn restart(&self) -> ! {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        panic!("platform restart");
    }

    fn halt(&self) -> ! {
        panic!("platform halt");
    }

    fn sleep(&self) -> ! {
        panic!("platform sleep");
    }
}
