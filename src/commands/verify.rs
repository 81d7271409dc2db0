//! Verify command
//!
//! Check for a compiled extension in a given folder

use super::Project;
use anyhow::Result;
use kiln::ArtifactVerifier;
use std::path::Path;

/// Succeed if `<folder>/<name>.<ext>` exists (or, with `absent`, if it does not)
pub(crate) fn run(project: &Project, name: &str, folder: &str, absent: bool) -> Result<()> {
    let verifier = ArtifactVerifier::new(project.dir.clone(), project.resolver());
    let folder = Path::new(folder);
    let path = verifier.artifact_path(name, folder);
    let exists = verifier.exists(name, folder);
    kiln::debug!("Checking {} (exists: {exists})", path.display());

    match (exists, absent) {
        (true, false) => println!("found {}", path.display()),
        (false, true) => println!("absent {}", path.display()),
        (false, false) => anyhow::bail!("Binary extension not found: {}", path.display()),
        (true, true) => anyhow::bail!("Binary extension should not exist: {}", path.display()),
    }

    Ok(())
}
