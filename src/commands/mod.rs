//! Subcommand implementations

pub(crate) mod clean;
pub(crate) mod compile;
pub(crate) mod completion;
pub(crate) mod new;
pub(crate) mod platforms;
pub(crate) mod stale;
pub(crate) mod verify;

use anyhow::{Context, Result};
use kiln::{Config, FingerprintStore, PlatformResolver};
use std::path::PathBuf;

/// A project root with its loaded configuration
#[derive(Debug)]
pub(crate) struct Project {
    pub(crate) dir: PathBuf,
    pub(crate) config: Config,
}

impl Project {
    /// Canonicalize `dir` and load its configuration
    pub(crate) fn load(dir: &str, config_path: Option<&str>, norc: bool) -> Result<Self> {
        let dir = PathBuf::from(dir)
            .canonicalize()
            .with_context(|| format!("Project directory not found: {dir}"))?;
        let config = Config::load_with_options(&dir, config_path, norc)?;
        kiln::debug!("Project {} with {:?}", dir.display(), config);
        Ok(Self { dir, config })
    }

    pub(crate) fn resolver(&self) -> PlatformResolver {
        PlatformResolver::from_config(&self.dir, &self.config)
    }

    /// Open the persisted fingerprint index
    pub(crate) fn fingerprints(&self) -> Result<FingerprintStore> {
        let index = self.config.fingerprint_index(&self.dir);
        FingerprintStore::open(index).context("Failed to load build fingerprints")
    }
}
