// Save/load state slots: permission policy and last-slot persistence

use crate::engine::input::{SlotAction, SlotKind};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Reply to a save request on a protected slot without the needed level
pub const ACCESS_DENIED_MESSAGE: &str = "Access denied";

/// Reply to a slot number outside the configured range
pub const INVALID_SLOT_MESSAGE: &str = "Invalid number.";

/// Why a slot request was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SlotRejection {
    #[error("Access denied")]
    AccessDenied,

    #[error("Invalid number.")]
    InvalidSlot,
}

impl SlotRejection {
    /// User-visible reply
    pub fn message(&self) -> &'static str {
        match self {
            Self::AccessDenied => ACCESS_DENIED_MESSAGE,
            Self::InvalidSlot => INVALID_SLOT_MESSAGE,
        }
    }
}

/// Who may use which slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPolicy {
    /// Valid slots are 1..=count
    pub count: u8,

    /// Save slots 1..=protected need `elevated_level`
    pub protected: u8,

    pub elevated_level: u32,
}

impl Default for SlotPolicy {
    fn default() -> Self {
        Self {
            count: 6,
            protected: 3,
            elevated_level: 3,
        }
    }
}

impl SlotPolicy {
    /// Check a request. Loading is never permission gated.
    pub fn authorize(&self, action: SlotAction, level: u32) -> Result<(), SlotRejection> {
        if action.slot == 0 || action.slot > self.count {
            return Err(SlotRejection::InvalidSlot);
        }
        if action.kind == SlotKind::Save
            && action.slot <= self.protected
            && level < self.elevated_level
        {
            return Err(SlotRejection::AccessDenied);
        }
        Ok(())
    }
}

/// Fire-and-forget record of the most recently used slots
pub trait SlotStore: Send + Sync {
    fn record_last_slot(&self, kind: SlotKind, slot: u8);

    fn last_slot(&self, kind: SlotKind) -> Option<u8>;
}

/// Slot store that forgets everything on exit
#[derive(Debug, Default)]
pub struct MemorySlotStore {
    last: Mutex<[Option<u8>; 2]>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn kind_index(kind: SlotKind) -> usize {
    match kind {
        SlotKind::Save => 0,
        SlotKind::Load => 1,
    }
}

impl SlotStore for MemorySlotStore {
    fn record_last_slot(&self, kind: SlotKind, slot: u8) {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)[kind_index(kind)] = Some(slot);
    }

    fn last_slot(&self, kind: SlotKind) -> Option<u8> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)[kind_index(kind)]
    }
}

/// Slot store writing `last_save.txt` / `last_load.txt` into a directory
#[derive(Debug, Clone)]
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, kind: SlotKind) -> PathBuf {
        self.dir.join(format!("last_{}.txt", kind.name()))
    }
}

impl SlotStore for FileSlotStore {
    fn record_last_slot(&self, kind: SlotKind, slot: u8) {
        let path = self.path(kind);
        if let Err(err) = fs::write(&path, slot.to_string()) {
            warn!("could not record last {} slot in {}: {}", kind.name(), path.display(), err);
        }
    }

    fn last_slot(&self, kind: SlotKind) -> Option<u8> {
        let text = fs::read_to_string(self.path(kind)).ok()?;
        text.trim().parse().ok()
    }
}
