//! Artifact checks
//!
//! Answers "does binary extension X exist in folder Y" after a build. The
//! file suffix comes from the target whose output directory is Y, falling
//! back to the host's suffix for folders no target owns.

use crate::platform::{PlatformResolver, binary_ext_for};
use std::path::{Path, PathBuf};

/// Read-only lookup of built artifacts
#[derive(Debug, Clone)]
pub struct ArtifactVerifier {
    project_dir: PathBuf,
    resolver: PlatformResolver,
}

impl ArtifactVerifier {
    /// Relative folders are taken relative to `project_dir`
    #[must_use]
    pub fn new(project_dir: PathBuf, resolver: PlatformResolver) -> Self {
        Self {
            project_dir,
            resolver,
        }
    }

    /// Expected path of `extension`'s binary in `folder`
    #[must_use]
    pub fn artifact_path(&self, extension: &str, folder: &Path) -> PathBuf {
        let folder = self.project_dir.join(folder);
        let binary_ext = self
            .resolver
            .target_for_output_dir(&folder)
            .map_or_else(|| binary_ext_for(self.resolver.host_platform()), |t| t.binary_ext);
        folder.join(format!("{extension}.{binary_ext}"))
    }

    /// Whether `<folder>/<extension>.<ext>` is present
    #[must_use]
    pub fn exists(&self, extension: &str, folder: &Path) -> bool {
        self.artifact_path(extension, folder).is_file()
    }
}
