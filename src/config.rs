//! Configuration file management
//!
//! Reads kiln's TOML configuration from the project (`.kiln.toml`) or the
//! user's config directory, then applies `KILN_*` environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project-local configuration file name
pub const PROJECT_CONFIG_FILE: &str = ".kiln.toml";

/// Fingerprint index file name, stored under the tmp directory
pub const FINGERPRINT_INDEX_FILE: &str = "kiln-fingerprints.json";

const DEFAULT_COMPILE_TIMEOUT_SECS: u64 = 600;

/// Application configuration loaded from TOML files
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory receiving compiled artifacts, relative to the project
    pub lib_dir: String,

    /// Directory holding per-platform build trees and the fingerprint index
    pub tmp_dir: String,

    /// Platforms built by `--platform cross`, after the native target
    pub cross_platforms: Vec<String>,

    /// Number of targets compiled concurrently
    pub jobs: usize,

    /// Upper bound for each toolchain step, in seconds
    pub compile_timeout_secs: u64,

    /// `rbconfig.rb` to use per cross platform
    pub rbconfig: BTreeMap<String, String>,

    /// Extra environment for `extconf.rb` and `make`, per target
    /// (`native` or a cross platform), e.g. a cross `CC`
    pub toolchain: BTreeMap<String, BTreeMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lib_dir: "lib".to_string(),
            tmp_dir: "tmp".to_string(),
            cross_platforms: Vec::new(),
            jobs: 1,
            compile_timeout_secs: DEFAULT_COMPILE_TIMEOUT_SECS,
            rbconfig: BTreeMap::new(),
            toolchain: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration for a project directory.
    /// Priority: `<project>/.kiln.toml` -> ~/.config/kiln/config.toml -> defaults
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config file cannot be parsed.
    pub fn load(project_dir: &Path) -> Result<Self> {
        Self::load_with_options(project_dir, None, false)
    }

    /// Load configuration with custom options.
    ///
    /// # Arguments
    /// * `project_dir` - Project root searched for `.kiln.toml`
    /// * `custom_path` - Optional custom path to config file (overrides defaults)
    /// * `skip_rc` - If true, skip loading config files (environment still applies)
    ///
    /// # Errors
    ///
    /// Returns an error if config file reading or parsing fails.
    pub fn load_with_options(
        project_dir: &Path,
        custom_path: Option<&str>,
        skip_rc: bool,
    ) -> Result<Self> {
        let config = if skip_rc {
            Self::default()
        } else if let Some(path) = custom_path {
            Self::load_from(path)
                .with_context(|| format!("Failed to load config file: {path}"))?
        } else {
            Self::discover(project_dir)?
        };

        Ok(config.with_env_overrides())
    }

    fn discover(project_dir: &Path) -> Result<Self> {
        let local = project_dir.join(PROJECT_CONFIG_FILE);
        if local.exists() {
            return Self::load_from(&local)
                .with_context(|| format!("Failed to load config file: {}", local.display()));
        }

        if let Some(config_dir) = Self::user_config_dir() {
            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                return Self::load_from(&config_path).with_context(|| {
                    format!("Failed to load config file: {}", config_path.display())
                });
            }
        }

        Ok(Self::default())
    }

    fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }

    fn user_config_dir() -> Option<PathBuf> {
        // Check XDG_CONFIG_HOME first
        if let Ok(xdg_config) = env::var("XDG_CONFIG_HOME") {
            return Some(PathBuf::from(xdg_config).join("kiln"));
        }

        // Fall back to ~/.config/kiln
        dirs::home_dir().map(|home| home.join(".config").join("kiln"))
    }

    /// Apply `KILN_CROSS_PLATFORMS`, `KILN_JOBS` and `KILN_TIMEOUT`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(platforms) = crate::env_vars::cross_platforms() {
            self.cross_platforms = platforms;
        }
        if let Some(jobs) = crate::env_vars::jobs() {
            self.jobs = jobs;
        }
        if let Some(secs) = crate::env_vars::compile_timeout_secs() {
            self.compile_timeout_secs = secs;
        }
        self
    }

    /// Artifact root for a project (`<project>/lib` by default)
    #[must_use]
    pub fn lib_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.lib_dir)
    }

    /// Build tree root for a project (`<project>/tmp` by default)
    #[must_use]
    pub fn tmp_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.tmp_dir)
    }

    /// Location of the persisted fingerprint index
    #[must_use]
    pub fn fingerprint_index(&self, project_dir: &Path) -> PathBuf {
        self.tmp_dir(project_dir).join(FINGERPRINT_INDEX_FILE)
    }

    /// Timeout for a single toolchain step. Zero disables the bound.
    #[must_use]
    pub fn compile_timeout(&self) -> Option<Duration> {
        (self.compile_timeout_secs > 0).then(|| Duration::from_secs(self.compile_timeout_secs))
    }

    /// `rbconfig.rb` paths keyed by platform, resolved against the project
    #[must_use]
    pub fn rbconfig_paths(&self, project_dir: &Path) -> BTreeMap<String, PathBuf> {
        self.rbconfig
            .iter()
            .map(|(platform, path)| (platform.clone(), project_dir.join(path)))
            .collect()
    }
}
