use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TillerError};

/// Top-level configuration for the Tiller engine.
///
/// Loaded from `~/.tiller/config.toml` by default. Each section covers one
/// subsystem; missing sections fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TillerConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub undo: UndoConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl Default for TillerConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            undo: UndoConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl TillerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TillerConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TillerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Undo ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    /// Seconds an action stays undoable after it is recorded.
    pub window_seconds: u64,
    /// Seconds between background sweeps that expire stale actions.
    pub sweep_interval_seconds: u64,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            window_seconds: 30,
            sweep_interval_seconds: 60,
        }
    }
}

/// Chat surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether the chat surface is enabled.
    pub enabled: bool,
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
    /// Reply used when no generator produces a conversational response.
    pub fallback_reply: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_message_length: 4000,
            fallback_reply: "Got it! Let me know if you need anything else.".to_string(),
        }
    }
}
