//! Persisted process state: the enable flag and the settings file.
//!
//! Both live under the configured tmp directory and are shared by every
//! caller using the same root. Writes are plain overwrites; the last writer
//! wins.

use crate::error::{HotMockError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// VCR (record-on-miss) mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VcrMode {
    /// Unmatched calls pass through.
    #[default]
    Off,
    /// Unmatched calls are recorded into the current scope.
    Default,
    /// Unmatched calls are recorded into the named scenario.
    Scenario(String),
}

impl VcrMode {
    pub fn is_on(&self) -> bool {
        !matches!(self, VcrMode::Off)
    }

    /// Scenario that recordings should target, if any.
    pub fn scenario(&self) -> Option<&str> {
        match self {
            VcrMode::Scenario(name) => Some(name),
            _ => None,
        }
    }
}

/// On-disk shape of `vcr`: `true`/`false` or a scenario name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum VcrValue {
    Flag(bool),
    Scenario(String),
}

impl VcrValue {
    fn into_mode(value: Option<VcrValue>) -> VcrMode {
        match value {
            None | Some(VcrValue::Flag(false)) => VcrMode::Off,
            Some(VcrValue::Flag(true)) => VcrMode::Default,
            Some(VcrValue::Scenario(name)) if name.is_empty() => VcrMode::Off,
            Some(VcrValue::Scenario(name)) => VcrMode::Scenario(name),
        }
    }

    fn from_mode(mode: &VcrMode) -> Option<VcrValue> {
        match mode {
            VcrMode::Off => None,
            VcrMode::Default => Some(VcrValue::Flag(true)),
            VcrMode::Scenario(name) => Some(VcrValue::Scenario(name.clone())),
        }
    }
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Active scenario
    pub scenario: Option<String>,
    /// VCR mode
    pub vcr: VcrMode,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scenario: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vcr: Option<VcrValue>,
}

impl SettingsFile {
    fn into_settings(self) -> Settings {
        Settings {
            scenario: self.scenario.filter(|s| !s.is_empty()),
            vcr: VcrValue::into_mode(self.vcr),
        }
    }

    fn from_settings(settings: &Settings) -> Self {
        Self {
            scenario: settings.scenario.clone(),
            vcr: VcrValue::from_mode(&settings.vcr),
        }
    }
}

/// Reads and writes the settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings. `None` when the file is absent or unreadable.
    pub fn load(&self) -> Option<Settings> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to read settings");
                }
                return None;
            }
        };

        if content.trim().is_empty() {
            return Some(Settings::default());
        }

        match serde_yaml::from_str::<SettingsFile>(&content) {
            Ok(file) => Some(file.into_settings()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring malformed settings");
                None
            }
        }
    }

    /// Load settings, falling back to defaults.
    pub fn current(&self) -> Settings {
        self.load().unwrap_or_default()
    }

    /// Overwrite the settings file, creating its directory on first write.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| HotMockError::io(parent, e))?;
        }
        let yaml = serde_yaml::to_string(&SettingsFile::from_settings(settings)).map_err(|source| {
            HotMockError::Serialize {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, yaml).map_err(|e| HotMockError::io(&self.path, e))?;
        debug!(
            path = %self.path.display(),
            scenario = ?settings.scenario,
            vcr = ?settings.vcr,
            "Settings saved"
        );
        Ok(())
    }

    /// Remove the settings file. Missing files are fine.
    pub fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HotMockError::io(&self.path, e)),
        }
    }
}

/// Existence-based enable marker.
#[derive(Debug, Clone)]
pub struct EnableFlag {
    path: PathBuf,
}

impl EnableFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.path.exists()
    }

    pub fn enable(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| HotMockError::io(parent, e))?;
        }
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| HotMockError::io(&self.path, e))?;
        Ok(())
    }

    pub fn disable(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HotMockError::io(&self.path, e)),
        }
    }

    /// Flip the flag and return the new state.
    pub fn toggle(&self) -> Result<bool> {
        if self.is_enabled() {
            self.disable()?;
            Ok(false)
        } else {
            self.enable()?;
            Ok(true)
        }
    }
}
