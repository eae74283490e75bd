//! Application lifecycle management
//!
//! The system manager owns the running application's descriptor, drives the
//! boot/switch/sleep/restart/halt transitions, and is the single funnel for
//! every fatal condition in the firmware, including allocator exhaustion.

use crate::panic::{FaultCode, PanicRecorder, PanicReport};
use crate::platform::{BatteryState, Platform};
use crate::spi::SpiBus;
use crate::telemetry::{FrameStats, Telemetry};
use once_cell::sync::OnceCell;
use op_core::error::{Result, StateError, SystemError};
use op_core::SystemConfig;
use op_memory::{MemCaps, MemoryPools, MemoryStats};
use op_state::{invoke_handler, NetplayCallback, PathKind, StateHandler, StatePaths};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Persisted setting naming the boot-time start action
const SETTING_START_ACTION: &str = "boot.action";

/// What the application should do right after boot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartAction {
    /// Cold start
    #[default]
    Normal,
    /// Load the most recent save-state before running
    Resume,
}

/// Lifecycle state of the current process image
///
/// `Panicking` always proceeds to `Restarting`. `Restarting` and `Halted`
/// are terminal; `Sleeping` hands control to the platform's low-power path
/// and wakes as a fresh boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Booting,
    Running,
    Panicking,
    Sleeping,
    Restarting,
    Halted,
}

/// Descriptor of the running application
///
/// Exactly one exists at a time, owned by the manager. The descriptor
/// itself is stable for the application's lifetime; only the registered
/// handlers and per-session flags mutate, and only through the manager.
pub struct AppDescriptor {
    pub id: u32,
    pub content_path: PathBuf,
    pub start_action: StartAction,
    content_id: AtomicU32,
    speedup: AtomicBool,
    load_state: Mutex<Option<StateHandler>>,
    save_state: Mutex<Option<StateHandler>>,
    netplay: Mutex<Option<NetplayCallback>>,
}

impl AppDescriptor {
    fn new(id: u32, content_path: PathBuf, start_action: StartAction) -> Self {
        Self {
            id,
            content_path,
            start_action,
            content_id: AtomicU32::new(0),
            speedup: AtomicBool::new(false),
            load_state: Mutex::new(None),
            save_state: Mutex::new(None),
            netplay: Mutex::new(None),
        }
    }

    /// Identity of the loaded content (checksum), zero until known
    pub fn content_id(&self) -> u32 {
        self.content_id.load(Ordering::Relaxed)
    }

    pub fn set_content_id(&self, id: u32) {
        self.content_id.store(id, Ordering::Relaxed);
    }

    /// Whether fast-forward behaviour is enabled
    pub fn speedup(&self) -> bool {
        self.speedup.load(Ordering::Relaxed)
    }

    pub fn set_speedup(&self, enabled: bool) {
        self.speedup.store(enabled, Ordering::Relaxed);
    }

    pub fn load_handler(&self) -> Option<StateHandler> {
        self.load_state.lock().clone()
    }

    pub fn save_handler(&self) -> Option<StateHandler> {
        self.save_state.lock().clone()
    }

    pub fn netplay_callback(&self) -> Option<NetplayCallback> {
        self.netplay.lock().clone()
    }

    fn set_handlers(
        &self,
        load: StateHandler,
        save: StateHandler,
        netplay: Option<NetplayCallback>,
    ) {
        *self.load_state.lock() = Some(load);
        *self.save_state.lock() = Some(save);
        *self.netplay.lock() = netplay;
    }
}

/// Point-in-time runtime statistics for the menu overlay
#[derive(Debug, Clone, Copy)]
pub struct RuntimeStats {
    pub battery: BatteryState,
    pub frame: FrameStats,
    pub memory: MemoryStats,
    pub idle_times_us: [u64; 2],
}

static SYSTEM: OnceCell<Arc<SystemManager>> = OnceCell::new();

/// The installed global system context
///
/// Available once [`SystemManager::init`] has run; used by the [`fatal!`]
/// macro so any subsystem can reach the panic funnel.
///
/// [`fatal!`]: crate::fatal
pub fn system() -> Arc<SystemManager> {
    SYSTEM
        .get()
        .cloned()
        .expect("system core is not initialized")
}

/// Owner of the application descriptor and all shared system services
pub struct SystemManager {
    platform: Arc<dyn Platform>,
    config: SystemConfig,
    pools: MemoryPools,
    bus: SpiBus,
    telemetry: Telemetry,
    recorder: PanicRecorder,
    paths: StatePaths,
    app: RwLock<Arc<AppDescriptor>>,
    state: Mutex<SystemState>,
    sample_rate: u32,
}

impl SystemManager {
    /// Boot the system core for application `app_id`.
    ///
    /// Initializes subsystems in dependency order, replays a pending panic
    /// trace as a recovery dialog, resets telemetry, and transitions to
    /// `Running`.
    pub fn init(
        platform: Arc<dyn Platform>,
        config: SystemConfig,
        app_id: u32,
        sample_rate: u32,
    ) -> Result<Arc<Self>> {
        tracing::info!(app_id, sample_rate, "system core booting");

        let pools = MemoryPools::new(config.memory.internal_size, config.memory.external_size)?;
        let telemetry = Telemetry::new(config.telemetry.frame_window, config.telemetry.target_fps);
        let recorder = PanicRecorder::new(platform.clone());
        let paths = StatePaths::new(config.paths.data.clone());

        let content_path = platform
            .read_setting(&config.boot.rom_setting)
            .map(PathBuf::from)
            .unwrap_or_default();
        let start_action = match platform.read_setting(SETTING_START_ACTION).as_deref() {
            Some("resume") => StartAction::Resume,
            _ => StartAction::Normal,
        };
        let app = AppDescriptor::new(app_id, content_path, start_action);

        let manager = Arc::new(Self {
            platform,
            config,
            pools,
            bus: SpiBus::new(),
            telemetry,
            recorder,
            paths,
            app: RwLock::new(Arc::new(app)),
            state: Mutex::new(SystemState::Booting),
            sample_rate,
        });

        if let Some(report) = manager.recorder.consume() {
            tracing::warn!(
                code = report.error_code,
                function = %report.function,
                "replaying crash from previous session"
            );
            manager.panic_dialog(&recovery_message(&report));
        }

        manager.telemetry.reset(manager.platform.elapsed_us());
        *manager.state.lock() = SystemState::Running;

        if SYSTEM.set(manager.clone()).is_err() {
            tracing::debug!("global system context already installed");
        }

        tracing::info!("system core running");
        Ok(manager)
    }

    /// Register the application's save/load handlers and netplay callback
    pub fn register_emu(
        &self,
        load: StateHandler,
        save: StateHandler,
        netplay: Option<NetplayCallback>,
    ) {
        let app = self.get_app();
        app.set_handlers(load, save, netplay);
        tracing::info!(app = app.id, "application handlers registered");
    }

    /// The current application descriptor; identity is stable while the
    /// application runs
    pub fn get_app(&self) -> Arc<AppDescriptor> {
        self.app.read().clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SystemState {
        *self.state.lock()
    }

    /// The audio sample rate the application booted with
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The shared SPI bus arbiter
    pub fn bus(&self) -> &SpiBus {
        &self.bus
    }

    /// Single funnel for every fatal condition.
    ///
    /// Records the trace into retained memory, then restarts. The recovery
    /// dialog appears on the *next* boot, since the trace must survive the
    /// reset.
    pub fn panic(&self, reason: &str, function: &str, file: &str) -> ! {
        self.fatal(FaultCode::Panic, reason, function, file)
    }

    fn fatal(&self, code: FaultCode, reason: &str, function: &str, file: &str) -> ! {
        *self.state.lock() = SystemState::Panicking;
        self.recorder.record(code, reason, function, file);
        *self.state.lock() = SystemState::Restarting;
        tracing::error!(reason, function, file, "fatal error, restarting");
        self.platform.restart()
    }

    /// Render a recovery dialog without touching process state
    pub fn panic_dialog(&self, reason: &str) {
        self.platform.show_dialog("System error", reason);
    }

    /// Whether an application of this name exists in the firmware image
    pub fn find_app(&self, name: &str) -> bool {
        self.config.apps.installed.iter().any(|app| app == name)
    }

    /// Persist `name` as the next boot application without restarting
    pub fn set_boot_app(&self, name: &str) {
        self.platform
            .write_setting(&self.config.boot.app_setting, name);
        tracing::info!(name, "boot application set");
    }

    /// Persist `name` as the boot application and restart into it
    pub fn switch_app(&self, name: &str) -> ! {
        self.set_boot_app(name);
        self.restart()
    }

    /// Soft reset into a fresh boot
    pub fn restart(&self) -> ! {
        *self.state.lock() = SystemState::Restarting;
        tracing::info!("restarting");
        self.platform.restart()
    }

    /// Unconditional stop
    pub fn halt(&self) -> ! {
        *self.state.lock() = SystemState::Halted;
        tracing::info!("halting");
        self.platform.halt()
    }

    /// Enter the platform's low-power path; wakes as a fresh boot
    pub fn sleep(&self) -> ! {
        *self.state.lock() = SystemState::Sleeping;
        tracing::info!("entering sleep");
        self.platform.sleep()
    }

    /// Allocate a block satisfying `caps`.
    ///
    /// Exhaustion is unrecoverable on a fixed-memory target: it goes
    /// through the panic funnel and this call does not return.
    pub fn alloc(&self, size: usize, caps: MemCaps) -> NonNull<u8> {
        match self.pools.allocate(size, caps) {
            Ok(ptr) => ptr,
            Err(_) => self.fatal(
                FaultCode::OutOfMemory,
                "memory exhausted",
                "SystemManager::alloc",
                file!(),
            ),
        }
    }

    /// Release a block back to its owning pool
    pub fn free(&self, ptr: NonNull<u8>) {
        self.pools.free(ptr);
    }

    /// Account one emulated frame
    pub fn tick(&self, skipped: bool, full: bool, busy_us: u64) {
        self.telemetry
            .tick(self.platform.elapsed_us(), skipped, full, busy_us);
    }

    /// Derive the current runtime statistics
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            battery: self.platform.battery(),
            frame: self.telemetry.stats(self.platform.elapsed_us()),
            memory: self.pools.stats(),
            idle_times_us: self.platform.idle_times(),
        }
    }

    /// Start a fresh telemetry session (app switch or resume)
    pub fn reset_stats(&self) {
        self.telemetry.reset(self.platform.elapsed_us());
    }

    /// Drive the status LED
    pub fn set_led(&self, on: bool) {
        self.platform.set_led(on);
    }

    /// Canonical path for `kind` relative to the running content
    pub fn path_for(&self, kind: PathKind) -> PathBuf {
        self.paths.resolve(kind, &self.get_app().content_path)
    }

    /// Save the current application state into `slot` (0 = default)
    pub fn save_state(&self, slot: u8) -> Result<()> {
        let app = self.get_app();
        let kind = PathKind::save_slot(slot).ok_or(StateError::InvalidSlot(slot))?;
        let path = self.paths.resolve(kind, &app.content_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(SystemError::Io)?;
        }

        invoke_handler(app.save_handler().as_ref(), &path)?;
        tracing::info!(slot, path = %path.display(), "state saved");
        Ok(())
    }

    /// Load the application state from `slot` (0 = default)
    pub fn load_state(&self, slot: u8) -> Result<()> {
        let app = self.get_app();
        let kind = PathKind::save_slot(slot).ok_or(StateError::InvalidSlot(slot))?;
        let path = self.paths.resolve(kind, &app.content_path);

        invoke_handler(app.load_handler().as_ref(), &path)?;
        tracing::info!(slot, path = %path.display(), "state loaded");
        Ok(())
    }
}

fn recovery_message(report: &PanicReport) -> String {
    format!(
        "The previous session crashed in {}: {}",
        report.function, report.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestPlatform;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn test_config(data_dir: &std::path::Path) -> SystemConfig {
        let mut config = SystemConfig::default();
        config.memory.internal_size = 4 * 1024;
        config.memory.external_size = 16 * 1024;
        config.paths.data = data_dir.to_path_buf();
        config.apps.installed = vec!["launcher".into(), "gb-emu".into()];
        config
    }

    fn boot(platform: &Arc<TestPlatform>, dir: &tempfile::TempDir) -> Arc<SystemManager> {
        let platform: Arc<dyn Platform> = platform.clone();
        SystemManager::init(platform, test_config(dir.path()), 7, 32_000).unwrap()
    }

    #[test]
    fn test_clean_boot_runs_without_dialog() {
        let platform = TestPlatform::new();
        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        assert_eq!(system.state(), SystemState::Running);
        assert_eq!(system.sample_rate(), 32_000);
        assert!(platform.dialogs().is_empty());
    }

    #[test]
    fn test_descriptor_comes_from_boot_settings() {
        let platform = TestPlatform::new();
        platform.write_setting("boot.rom", "/sd/roms/gb/mario.gb");
        platform.write_setting("boot.action", "resume");

        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        let app = system.get_app();
        assert_eq!(app.id, 7);
        assert_eq!(app.content_path, PathBuf::from("/sd/roms/gb/mario.gb"));
        assert_eq!(app.start_action, StartAction::Resume);
        assert!(!app.speedup());
    }

    #[test]
    fn test_get_app_identity_is_stable() {
        let platform = TestPlatform::new();
        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        let first = system.get_app();
        let second = system.get_app();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_panic_records_and_replays_once() {
        let platform = TestPlatform::new();
        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        let result = catch_unwind(AssertUnwindSafe(|| {
            system.panic("display timeout", "lcd_flush", "display.rs");
        }));
        assert!(result.is_err());
        assert_eq!(platform.restarts(), 1);
        assert_eq!(system.state(), SystemState::Restarting);
        drop(system);

        // Next boot over the same platform replays the crash once
        let rebooted = boot(&platform, &dir);
        let dialogs = platform.dialogs();
        assert_eq!(dialogs.len(), 1);
        assert!(dialogs[0].contains("display timeout"));
        assert!(dialogs[0].contains("lcd_flush"));
        drop(rebooted);

        // And a second reboot stays quiet
        let _third = boot(&platform, &dir);
        assert_eq!(platform.dialogs().len(), 1);
    }

    #[test]
    fn test_allocation_exhaustion_is_fatal_once() {
        let platform = TestPlatform::new();
        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        // No pool advertises FAST and SLOW together
        let result = catch_unwind(AssertUnwindSafe(|| {
            system.alloc(64, MemCaps::FAST | MemCaps::SLOW);
        }));
        assert!(result.is_err());
        assert_eq!(platform.restarts(), 1);
        drop(system);

        let rebooted = boot(&platform, &dir);
        let dialogs = platform.dialogs();
        assert_eq!(dialogs.len(), 1);
        assert!(dialogs[0].contains("memory exhausted"));
        drop(rebooted);
    }

    #[test]
    fn test_alloc_and_free_route_through_pools() {
        let platform = TestPlatform::new();
        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        let ptr = system.alloc(256, MemCaps::FAST);
        let stats = system.stats();
        assert!(stats.memory.internal.free_bytes < 4 * 1024);

        system.free(ptr);
        assert_eq!(system.stats().memory.internal.free_bytes, 4 * 1024);
    }

    #[test]
    fn test_boot_app_persistence() {
        let platform = TestPlatform::new();
        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        assert!(system.find_app("gb-emu"));
        assert!(!system.find_app("nes-emu"));

        system.set_boot_app("gb-emu");
        assert_eq!(platform.setting("boot.app").as_deref(), Some("gb-emu"));
        assert_eq!(platform.restarts(), 0);

        let result = catch_unwind(AssertUnwindSafe(|| {
            system.switch_app("launcher");
        }));
        assert!(result.is_err());
        assert_eq!(platform.setting("boot.app").as_deref(), Some("launcher"));
        assert_eq!(platform.restarts(), 1);
        assert_eq!(system.state(), SystemState::Restarting);
    }

    #[test]
    fn test_terminal_transitions() {
        let platform = TestPlatform::new();
        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        assert!(catch_unwind(AssertUnwindSafe(|| system.halt())).is_err());
        assert_eq!(system.state(), SystemState::Halted);

        assert!(catch_unwind(AssertUnwindSafe(|| system.sleep())).is_err());
        assert_eq!(system.state(), SystemState::Sleeping);
    }

    #[test]
    fn test_state_round_trip_through_handlers() {
        let platform = TestPlatform::new();
        platform.write_setting("boot.rom", "/sd/roms/gb/mario.gb");
        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        // Without handlers both directions fail recoverably
        assert!(matches!(
            system.save_state(0),
            Err(SystemError::State(StateError::NoHandler))
        ));

        let payload = b"cpu=0x1204 lcd=0x40".to_vec();
        let saved = payload.clone();
        let save: StateHandler =
            Arc::new(move |path| std::fs::write(path, &saved).is_ok());
        let load: StateHandler = Arc::new(move |path| {
            std::fs::read(path).map(|data| data == payload).unwrap_or(false)
        });
        system.register_emu(load, save, None);

        system.save_state(1).unwrap();
        system.load_state(1).unwrap();

        // A slot that was never written fails through the handler
        assert!(matches!(
            system.load_state(2),
            Err(SystemError::State(StateError::HandlerFailed(_)))
        ));

        // Slots outside the table are rejected up front
        assert!(matches!(
            system.save_state(9),
            Err(SystemError::State(StateError::InvalidSlot(9)))
        ));
    }

    #[test]
    fn test_path_for_is_stable_across_boots() {
        let platform = TestPlatform::new();
        platform.write_setting("boot.rom", "/sd/roms/gb/mario.gb");
        let dir = tempfile::tempdir().unwrap();

        let system = boot(&platform, &dir);
        let sram = system.path_for(PathKind::Sram);
        assert_eq!(sram, dir.path().join("saves").join("mario.gb.sram"));
        drop(system);

        let rebooted = boot(&platform, &dir);
        assert_eq!(rebooted.path_for(PathKind::Sram), sram);
    }

    #[test]
    fn test_tick_and_stats_through_manager() {
        let platform = TestPlatform::new();
        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        for _ in 0..120 {
            platform.advance(16_666);
            system.tick(false, true, 8_000);
        }
        platform.advance(80);

        let stats = system.stats();
        assert!((stats.frame.total_fps - 60.0).abs() < 0.5);
        assert_eq!(stats.battery.percent, 80);
        assert_eq!(stats.idle_times_us, [1_000, 2_000]);
        assert!(stats.memory.external.free_bytes > 0);

        system.reset_stats();
        assert_eq!(system.stats().frame.total_fps, 0.0);
    }

    #[test]
    fn test_led_delegates_to_platform() {
        let platform = TestPlatform::new();
        let dir = tempfile::tempdir().unwrap();
        let system = boot(&platform, &dir);

        system.set_led(true);
        assert!(platform.led());
        system.set_led(false);
        assert!(!platform.led());
    }
}
