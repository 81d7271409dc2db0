//! Compile command
//!
//! Build an extension for the requested platforms, skipping those whose
//! sources are unchanged since their last successful build.

use super::Project;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use kiln::{BuildOrchestrator, MkmfBackend, PlatformRequest, discover_extension};

/// Options for the compile command
#[derive(Debug, Clone, Copy)]
pub(crate) struct CompileOptions {
    pub(crate) force: bool,
    pub(crate) jobs: Option<usize>,
    pub(crate) verbose: bool,
    pub(crate) quiet: bool,
}

/// Compile `name` for `platform` (`native`, `cross`, or a platform name)
pub(crate) fn run(
    project: &Project,
    name: &str,
    platform: &str,
    options: CompileOptions,
) -> Result<()> {
    let extension = discover_extension(&project.dir, name)
        .with_context(|| format!("Failed to load extension '{name}'"))?;
    let resolver = project.resolver();
    let request = PlatformRequest::from(platform);
    let targets = resolver.resolve(&request)?;

    let backend = MkmfBackend::new(options.verbose, project.config.compile_timeout())?;
    let store = project.fingerprints()?;
    let jobs = options.jobs.unwrap_or(project.config.jobs);

    let mut orchestrator = BuildOrchestrator::new(backend, store)
        .with_force(options.force)
        .with_jobs(jobs);

    let progress = (!options.quiet && !options.verbose && targets.len() > 1).then(|| {
        let pb = ProgressBar::new(targets.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!("compiling {name}"));
        pb
    });
    if let Some(pb) = &progress {
        orchestrator = orchestrator.with_progress(pb.clone());
    }

    let results = orchestrator.build(&extension, &targets);

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    // Fingerprints of the targets that did build are worth keeping even if others failed
    orchestrator
        .store()
        .save()
        .context("Failed to save build fingerprints")?;

    let summary = BuildOrchestrator::<MkmfBackend>::summarize(&results);

    for result in &results {
        match (&result.error, &result.artifact) {
            (Some(error), _) => {
                eprintln!("  FAIL {} [{}] - {error}", result.extension, result.platform);
                if options.verbose && !result.output.is_empty() {
                    eprintln!("{}", result.output);
                }
            }
            (None, Some(artifact)) if !options.quiet => {
                let shown = artifact.strip_prefix(&project.dir).unwrap_or(artifact);
                println!(
                    "  {} {} [{}] -> {}",
                    if result.is_skipped() { "OK" } else { "BUILT" },
                    result.extension,
                    result.platform,
                    shown.display()
                );
            }
            _ => {}
        }
    }

    if !options.quiet {
        println!();
        println!(
            "Compiled {} of {} platform(s) in {:.2}s ({} up to date{})",
            summary.succeeded,
            results.len(),
            summary.duration.as_secs_f64(),
            summary.skipped,
            if summary.failed > 0 {
                format!(", {} failed", summary.failed)
            } else {
                String::new()
            }
        );
    }

    if summary.failed > 0 {
        anyhow::bail!("{} platform(s) failed to compile", summary.failed);
    }

    Ok(())
}
