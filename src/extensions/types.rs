//! Extension type definitions
//!
//! An extension is a native add-on compiled from the sources in
//! `ext/<name>/`. This module defines the extension itself, the outcome of
//! building it for one target, and the errors a build can hit.

use crate::platform::PlatformError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// A native extension of a gem project
///
/// Immutable for the duration of a build run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Extension name, also the artifact's file stem
    pub name: String,
    /// Source files in build order
    pub sources: Vec<PathBuf>,
    /// Project root owning `ext/<name>/`
    pub project_dir: PathBuf,
}

impl Extension {
    #[must_use]
    pub fn new(name: impl Into<String>, sources: Vec<PathBuf>, project_dir: PathBuf) -> Self {
        Self {
            name: name.into(),
            sources,
            project_dir,
        }
    }

    /// Directory holding this extension's sources (`<project>/ext/<name>`)
    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.project_dir.join("ext").join(&self.name)
    }

    /// The `extconf.rb` among the sources, if any
    #[must_use]
    pub fn extconf(&self) -> Option<&Path> {
        self.sources
            .iter()
            .map(PathBuf::as_path)
            .find(|p| p.file_name().is_some_and(|n| n == "extconf.rb"))
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("{step} failed: {diagnostic}")]
    Compile {
        step: &'static str,
        diagnostic: String,
    },

    #[error("{step} timed out after {timeout:?}")]
    Timeout {
        step: &'static str,
        timeout: Duration,
    },

    #[error("No source files found in {}", dir.display())]
    NoSources { dir: PathBuf },

    #[error("No compiled extension found in {}", dir.display())]
    MissingArtifact { dir: PathBuf },
}

impl BuildError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Terminal state of one (extension, platform) build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Compiled and fingerprinted
    Success,
    /// Compilation or artifact installation failed
    Failed,
    /// Sources unchanged since the last successful build
    Skipped,
}

impl std::fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "built"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "up to date"),
        }
    }
}

/// Result of building an extension for one target
#[derive(Debug)]
pub struct BuildResult {
    /// Extension name
    pub extension: String,

    /// Target identifier
    pub platform: String,

    /// What happened
    pub outcome: BuildOutcome,

    /// Artifact location for `Success` and `Skipped`
    pub artifact: Option<PathBuf>,

    /// Why the build failed
    pub error: Option<BuildError>,

    /// Build duration
    pub duration: Duration,

    /// Toolchain output (stdout + stderr)
    pub output: String,
}

impl BuildResult {
    /// Create a successful build result
    #[must_use]
    pub fn success(
        extension: &str,
        platform: &str,
        artifact: PathBuf,
        duration: Duration,
        output: String,
    ) -> Self {
        Self {
            extension: extension.to_string(),
            platform: platform.to_string(),
            outcome: BuildOutcome::Success,
            artifact: Some(artifact),
            error: None,
            duration,
            output,
        }
    }

    /// Create a result for a target whose sources did not change
    #[must_use]
    pub fn skipped(extension: &str, platform: &str, artifact: PathBuf) -> Self {
        Self {
            extension: extension.to_string(),
            platform: platform.to_string(),
            outcome: BuildOutcome::Skipped,
            artifact: Some(artifact),
            error: None,
            duration: Duration::ZERO,
            output: String::new(),
        }
    }

    /// Create a failed build result
    #[must_use]
    pub fn failure(
        extension: &str,
        platform: &str,
        error: BuildError,
        duration: Duration,
        output: String,
    ) -> Self {
        Self {
            extension: extension.to_string(),
            platform: platform.to_string(),
            outcome: BuildOutcome::Failed,
            artifact: None,
            error: Some(error),
            duration,
            output,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == BuildOutcome::Success
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome == BuildOutcome::Failed
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.outcome == BuildOutcome::Skipped
    }
}
