//! Canonical path mapping for content-relative files

use std::path::{Path, PathBuf};

/// Role of a file relative to a piece of content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathKind {
    /// Default save-state
    SaveState,
    /// Save-state slot 1
    SaveSlot1,
    /// Save-state slot 2
    SaveSlot2,
    /// Save-state slot 3
    SaveSlot3,
    /// Backup copy of the default save-state
    SaveBackup,
    /// Persistent battery-backed save
    Sram,
    /// Temporary scratch file
    TempFile,
    /// The content file itself
    RomFile,
    /// Artwork asset
    Artwork,
    /// Checksum cache file
    CrcCache,
}

impl PathKind {
    /// Map a numeric save slot to its kind. Slot 0 is the default state.
    pub fn save_slot(slot: u8) -> Option<PathKind> {
        match slot {
            0 => Some(Self::SaveState),
            1 => Some(Self::SaveSlot1),
            2 => Some(Self::SaveSlot2),
            3 => Some(Self::SaveSlot3),
            _ => None,
        }
    }

    fn subdir(&self) -> &'static str {
        match self {
            Self::SaveState | Self::SaveSlot1 | Self::SaveSlot2 | Self::SaveSlot3
            | Self::SaveBackup => "states",
            Self::Sram => "saves",
            Self::TempFile => "tmp",
            Self::RomFile => "",
            Self::Artwork => "art",
            Self::CrcCache => "cache",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Self::SaveState => ".sav",
            Self::SaveSlot1 => ".1.sav",
            Self::SaveSlot2 => ".2.sav",
            Self::SaveSlot3 => ".3.sav",
            Self::SaveBackup => ".sav.bak",
            Self::Sram => ".sram",
            Self::TempFile => ".tmp",
            Self::RomFile => "",
            Self::Artwork => ".png",
            Self::CrcCache => ".crc",
        }
    }
}

/// Deterministic resolver from (kind, content) to a canonical path
///
/// The mapping depends only on the configured base directory and the content
/// file name, so save data is rediscoverable for a given piece of content
/// across restarts.
#[derive(Debug, Clone)]
pub struct StatePaths {
    base: PathBuf,
}

impl StatePaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve the canonical path for `kind` relative to `content_path`
    pub fn resolve(&self, kind: PathKind, content_path: &Path) -> PathBuf {
        if kind == PathKind::RomFile {
            return content_path.to_path_buf();
        }

        let name = content_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());

        self.base
            .join(kind.subdir())
            .join(format!("{}{}", name, kind.suffix()))
    }
}
