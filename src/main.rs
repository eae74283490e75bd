//! Oxidized-Pocket - handheld emulation firmware
//!
//! Host-simulation entry point: boots the system core against the host
//! platform backend, runs a short emulated session, and reports stats.

use op_core::SystemConfig;
use op_memory::MemCaps;
use op_state::StateHandler;
use op_system::{frame_time_us, HostPlatform, Platform, SpiDevice, SystemManager};
use std::sync::Arc;
use std::time::Duration;

const APP_ID: u32 = 1;
const SAMPLE_RATE: u32 = 32_000;

fn main() -> anyhow::Result<()> {
    op_core::logging::init();

    tracing::info!("Starting Oxidized-Pocket system core");

    let config = SystemConfig::load().map_err(|err| anyhow::anyhow!("{err}"))?;
    let data_dir = config.paths.data.clone();
    let platform = Arc::new(HostPlatform::new(&data_dir));

    // Stand in for the boot selection step
    platform.write_setting(&config.boot.rom_setting, "demo/rustacean.gb");

    let system = SystemManager::init(platform, config, APP_ID, SAMPLE_RATE)?;

    let save: StateHandler = Arc::new(|path| std::fs::write(path, b"demo state").is_ok());
    let load: StateHandler = Arc::new(|path| std::fs::read(path).is_ok());
    system.register_emu(load, save, None);

    // A frame buffer the display driver could DMA from
    let frame_buffer = system.alloc(160 * 144 * 2, MemCaps::DMA | MemCaps::MEM_8BIT);

    let frame_us = frame_time_us(60);
    for frame in 0u32..120 {
        system.bus().acquire(SpiDevice::Display);
        std::thread::sleep(Duration::from_micros(frame_us / 8));
        system.bus().release(SpiDevice::Display);

        system.tick(false, frame % 2 == 0, frame_us / 8);
    }

    let stats = system.stats();
    tracing::info!(
        total_fps = stats.frame.total_fps,
        busy_percent = stats.frame.busy_percent,
        free_internal = stats.memory.internal.free_bytes,
        free_external = stats.memory.external.free_bytes,
        "session stats"
    );

    system.free(frame_buffer);

    system.save_state(0)?;
    system.load_state(0)?;
    tracing::info!("state round trip complete");

    Ok(())
}
