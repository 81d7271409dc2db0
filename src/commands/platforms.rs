//! Platforms command
//!
//! Show the targets a platform request resolves to

use super::Project;
use anyhow::Result;
use kiln::PlatformRequest;

/// List id, toolchain platform, output folder and suffix of each target
pub(crate) fn run(project: &Project, platform: &str) -> Result<()> {
    let resolver = project.resolver();
    let targets = resolver.resolve(&PlatformRequest::from(platform))?;

    println!("Host platform: {}", resolver.host_platform());
    println!();

    for target in &targets {
        let output_dir = target
            .output_dir
            .strip_prefix(&project.dir)
            .unwrap_or(&target.output_dir);
        print!(
            "  {:<16} {:<24} {:<24} .{}",
            target.id,
            target.platform,
            output_dir.display(),
            target.binary_ext
        );
        match &target.rbconfig {
            Some(rbconfig) => println!("  (rbconfig: {})", rbconfig.display()),
            None => println!(),
        }
    }

    Ok(())
}
