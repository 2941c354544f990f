//! Configuration for hot-mock.
//!
//! Defines where mocks and state files live and which environments never mock.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding [`HotMockConfig::environment`].
pub const ENV_VAR: &str = "HOT_MOCK_ENV";
/// Environment variable overriding [`HotMockConfig::root`].
pub const ROOT_VAR: &str = "HOT_MOCK_ROOT";

/// Name of the canonical collection file in every scope.
pub const DEFAULT_FILE_NAME: &str = "hot_mocks.yml";
/// Name of the settings file under the tmp directory.
pub const SETTINGS_FILE_NAME: &str = "hot_mock_settings.yml";
/// Directory holding scenario subtrees under the environment root.
pub const SCENARIOS_DIR: &str = "scenarios";

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HotMockConfig {
    /// Project root all other paths are relative to
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Environment name (partitions mocks and the enable flag)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Directory holding per-environment mock trees
    #[serde(default = "default_mocks_dir")]
    pub mocks_dir: PathBuf,

    /// Directory holding the enable flag and settings file
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,

    /// Environments in which mocking is never active
    #[serde(default = "default_production_environments")]
    pub production_environments: Vec<String>,

    /// Logging settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_mocks_dir() -> PathBuf {
    PathBuf::from("mocks")
}

fn default_tmp_dir() -> PathBuf {
    PathBuf::from("tmp")
}

fn default_production_environments() -> Vec<String> {
    vec!["production".to_string()]
}

impl Default for HotMockConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            environment: default_environment(),
            mocks_dir: default_mocks_dir(),
            tmp_dir: default_tmp_dir(),
            production_environments: default_production_environments(),
            settings: GlobalSettings::default(),
        }
    }
}

impl HotMockConfig {
    /// Configuration rooted at `root` for `environment`, other fields default.
    pub fn new(root: impl Into<PathBuf>, environment: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            environment: environment.into(),
            ..Self::default()
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `HOT_MOCK_ENV` / `HOT_MOCK_ROOT` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(env) = std::env::var(ENV_VAR) {
            if !env.is_empty() {
                self.environment = env;
            }
        }
        if let Ok(root) = std::env::var(ROOT_VAR) {
            if !root.is_empty() {
                self.root = PathBuf::from(root);
            }
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_segment("environment", &self.environment)?;
        if self.mocks_dir.as_os_str().is_empty() {
            anyhow::bail!("mocks_dir cannot be empty");
        }
        if self.tmp_dir.as_os_str().is_empty() {
            anyhow::bail!("tmp_dir cannot be empty");
        }
        Ok(())
    }

    /// Whether this environment is production-class.
    pub fn is_production(&self) -> bool {
        self.production_environments
            .iter()
            .any(|env| env.eq_ignore_ascii_case(&self.environment))
    }

    /// `<root>/<mocks_dir>/<environment>`
    pub fn mocks_root(&self) -> PathBuf {
        self.root.join(&self.mocks_dir).join(&self.environment)
    }

    /// `<root>/<tmp_dir>/mocking-<environment>.txt`
    pub fn enabled_flag_path(&self) -> PathBuf {
        self.root
            .join(&self.tmp_dir)
            .join(format!("mocking-{}.txt", self.environment))
    }

    /// `<root>/<tmp_dir>/hot_mock_settings.yml`
    pub fn settings_path(&self) -> PathBuf {
        self.root.join(&self.tmp_dir).join(SETTINGS_FILE_NAME)
    }
}

/// Reject names that would escape their directory.
fn validate_segment(what: &str, value: &str) -> anyhow::Result<()> {
    if value.is_empty() {
        anyhow::bail!("{} cannot be empty", what);
    }
    if !is_single_segment(value) {
        anyhow::bail!("{} `{}` must be a single path segment", what, value);
    }
    Ok(())
}

/// Whether `value` names exactly one directory entry.
pub(crate) fn is_single_segment(value: &str) -> bool {
    !value.is_empty() && !value.contains(['/', '\\']) && value != "." && value != ".."
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Log every served mock
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log calls that fall through to the real transport
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_matches: true,
            log_unmatched: true,
        }
    }
}
