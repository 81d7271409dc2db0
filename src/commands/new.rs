//! New command
//!
//! Scaffold a native extension under ext/

use super::Project;
use anyhow::Result;
use kiln::{enable_cross_compilation, generate_extension};

/// Create `ext/<name>/` and optionally register cross platforms
pub(crate) fn run(project: &Project, name: &str, cross: &[String]) -> Result<()> {
    let files = generate_extension(&project.dir, name)?;

    for file in &files {
        let shown = file.strip_prefix(&project.dir).unwrap_or(file);
        println!("  create {}", shown.display());
    }

    if !cross.is_empty() {
        let config_path = enable_cross_compilation(&project.dir, cross)?;
        let shown = config_path
            .strip_prefix(&project.dir)
            .unwrap_or(&config_path);
        println!("  update {} (cross: {})", shown.display(), cross.join(", "));
    }

    println!();
    println!("Compile it with: kiln compile {name}");
    Ok(())
}
