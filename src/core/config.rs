// Bot configuration loaded from TOML

use crate::engine::controller::SlotPolicy;
use crate::engine::input::profile::PHYSICAL_SLOTS;
use crate::engine::input::{Console, MacroError, MacroTable, ParserLimits, Synonyms};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Configuration failures
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid macro {name}: {source}")]
    InvalidMacro {
        name: String,
        #[source]
        source: MacroError,
    },

    #[error("unknown console: {0}")]
    UnknownConsole(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub input: InputSettings,
    #[serde(default)]
    pub controllers: ControllerSettings,
    #[serde(default)]
    pub permissions: PermissionSettings,
    #[serde(default)]
    pub slots: SlotSettings,
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default = "default_synonyms")]
    pub synonyms: BTreeMap<String, String>,
    #[serde(default)]
    pub macros: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSettings {
    #[serde(default = "default_console")]
    pub console: String,
    #[serde(default = "default_duration")]
    pub default_duration_ms: u32,
    #[serde(default = "default_max_sequence")]
    pub max_sequence_ms: u32,
    #[serde(default = "default_start_max")]
    pub start_max_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSettings {
    #[serde(default = "default_controller_count")]
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSettings {
    #[serde(default = "default_elevated_level")]
    pub elevated_level: u32,
    #[serde(default = "default_protected_slots")]
    pub protected_slots: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSettings {
    #[serde(default = "default_slot_count")]
    pub count: u8,
    #[serde(default = "default_duration")]
    pub press_ms: u32,
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
}

fn default_console() -> String {
    "snes".to_string()
}

fn default_duration() -> u32 {
    200
}

fn default_max_sequence() -> u32 {
    60_000
}

fn default_start_max() -> u32 {
    500
}

fn default_controller_count() -> usize {
    2
}

fn default_elevated_level() -> u32 {
    3
}

fn default_protected_slots() -> u8 {
    3
}

fn default_slot_count() -> u8 {
    6
}

fn default_prefix() -> String {
    "!".to_string()
}

fn default_synonyms() -> BTreeMap<String, String> {
    BTreeMap::from([("kappa".to_string(), "#".to_string())])
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            input: InputSettings::default(),
            controllers: ControllerSettings::default(),
            permissions: PermissionSettings::default(),
            slots: SlotSettings::default(),
            chat: ChatSettings::default(),
            synonyms: default_synonyms(),
            macros: BTreeMap::new(),
        }
    }
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            console: default_console(),
            default_duration_ms: default_duration(),
            max_sequence_ms: default_max_sequence(),
            start_max_ms: default_start_max(),
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            count: default_controller_count(),
        }
    }
}

impl Default for PermissionSettings {
    fn default() -> Self {
        Self {
            elevated_level: default_elevated_level(),
            protected_slots: default_protected_slots(),
        }
    }
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            count: default_slot_count(),
            press_ms: default_duration(),
            state_dir: None,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            command_prefix: default_prefix(),
        }
    }
}

impl BotConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// The configured console profile
    pub fn console(&self) -> Result<Console, ConfigError> {
        self.input
            .console
            .parse()
            .map_err(|_| ConfigError::UnknownConsole(self.input.console.clone()))
    }

    pub fn parser_limits(&self) -> ParserLimits {
        ParserLimits {
            default_duration_ms: self.input.default_duration_ms,
            max_total_ms: self.input.max_sequence_ms,
            start_max_ms: self.input.start_max_ms,
        }
    }

    /// Slot gate; the count never exceeds the slots a profile binds
    pub fn slot_policy(&self) -> SlotPolicy {
        SlotPolicy {
            count: self.slots.count.min(PHYSICAL_SLOTS),
            protected: self.permissions.protected_slots,
            elevated_level: self.permissions.elevated_level,
        }
    }

    pub fn synonyms(&self) -> Synonyms {
        self.synonyms.iter().collect()
    }

    /// Build the macro table, checking every name
    pub fn macro_table(&self) -> Result<MacroTable, ConfigError> {
        let mut table = MacroTable::new();
        for (name, template) in &self.macros {
            table
                .insert(name, template)
                .map_err(|source| ConfigError::InvalidMacro {
                    name: name.clone(),
                    source,
                })?;
        }
        Ok(table)
    }
}
