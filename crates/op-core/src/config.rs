//! Configuration system for the oxidized-pocket firmware

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct SystemConfig {
    pub memory: MemoryConfig,
    pub telemetry: TelemetryConfig,
    pub paths: PathConfig,
    pub boot: BootConfig,
    pub apps: AppTableConfig,
}

/// Memory pool sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Internal (fast, DMA-capable) pool size in bytes
    pub internal_size: usize,
    /// External (slow expansion) pool size in bytes
    pub external_size: usize,
}

/// Runtime telemetry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Frame-time moving-average window, in frames
    pub frame_window: u16,
    /// Refresh rate the emulated speed ratio is measured against
    pub target_fps: u32,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Root of all firmware-managed data (saves, states, artwork, cache)
    pub data: PathBuf,
    /// Where content files are looked up
    pub roms: PathBuf,
}

/// Boot selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    /// Name of the persisted setting holding the next boot application
    pub app_setting: String,
    /// Name of the persisted setting holding the content path to open
    pub rom_setting: String,
}

/// Table of applications present in the firmware image
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppTableConfig {
    pub installed: Vec<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            internal_size: 256 * 1024,
            external_size: 4 * 1024 * 1024,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            frame_window: 32,
            target_fps: 60,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oxidized-pocket");

        Self {
            data: base.join("data"),
            roms: base.join("roms"),
        }
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            app_setting: "boot.app".to_string(),
            rom_setting: "boot.rom".to_string(),
        }
    }
}

impl Default for AppTableConfig {
    fn default() -> Self {
        Self {
            installed: vec!["launcher".to_string()],
        }
    }
}

impl SystemConfig {
    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let path = Self::config_path();

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save()?;
            tracing::info!(path = %path.display(), "created default configuration");
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("oxidized-pocket")
            .join("config.toml")
    }
}
