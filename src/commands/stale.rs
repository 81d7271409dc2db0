//! Stale command
//!
//! Report which targets would be rebuilt by `kiln compile`

use super::Project;
use anyhow::{Context, Result};
use kiln::{PlatformRequest, discover_extension};

/// Print `stale` or `up to date` for each target of `platform`
pub(crate) fn run(project: &Project, name: &str, platform: &str) -> Result<()> {
    let extension = discover_extension(&project.dir, name)
        .with_context(|| format!("Failed to load extension '{name}'"))?;
    let targets = project.resolver().resolve(&PlatformRequest::from(platform))?;
    let store = project.fingerprints()?;

    for target in &targets {
        let artifact = target.artifact_path(name);
        let state = if artifact.is_file() {
            if store.is_stale(&extension, &target.id) {
                "stale"
            } else {
                "up to date"
            }
        } else {
            "missing"
        };
        println!("{name} [{}]: {state}", target.id);
    }

    Ok(())
}
