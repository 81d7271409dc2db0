//! Clean command
//!
//! Remove build trees and fingerprints, and with `--clobber` the compiled
//! binaries too

use super::Project;
use anyhow::{Context, Result};
use kiln::PlatformTarget;
use std::fs;
use std::path::Path;

/// Clean one extension, or every extension when `name` is `None`
pub(crate) fn run(project: &Project, name: Option<&str>, clobber: bool) -> Result<()> {
    let resolver = project.resolver();
    let targets: Vec<PlatformTarget> = resolver
        .available()
        .into_iter()
        .filter_map(|id| resolver.target_for(id))
        .collect();

    let names = match name {
        Some(name) => vec![name.to_string()],
        None => extension_names(&project.dir.join("ext"))?,
    };

    let mut removed = 0usize;

    if let Some(name) = name {
        for target in &targets {
            removed += remove_path(&target.build_dir(name))?;
        }
        let store = project.fingerprints()?;
        store.forget_extension(name);
        store.save().context("Failed to save build fingerprints")?;
    } else {
        removed += remove_path(&project.config.tmp_dir(&project.dir))?;
    }

    if clobber {
        for name in &names {
            for target in &targets {
                removed += remove_path(&target.artifact_path(name))?;
            }
        }
    }

    println!("Removed {removed} path(s)");
    Ok(())
}

/// Directory names under `ext/`, empty if it does not exist
fn extension_names(ext_dir: &Path) -> Result<Vec<String>> {
    if !ext_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names: Vec<String> = fs::read_dir(ext_dir)
        .with_context(|| format!("Failed to read {}", ext_dir.display()))?
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();
    Ok(names)
}

/// Remove a file or directory tree, returning 1 if something was removed
fn remove_path(path: &Path) -> Result<usize> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else if path.exists() {
        fs::remove_file(path)
    } else {
        return Ok(0);
    };

    result.with_context(|| format!("Failed to remove {}", path.display()))?;
    kiln::debug!("Removed {}", path.display());
    Ok(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests can panic")]
mod tests {
    use super::*;
    use kiln::{Config, Extension, FingerprintStore, binary_ext_for, detect_current_platform};
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// `lib/native/<ext>` with the host's shared-library suffix
    fn native_artifact(temp: &TempDir, ext: &str) -> PathBuf {
        let suffix = binary_ext_for(&detect_current_platform());
        temp.path().join("lib/native").join(format!("{ext}.{suffix}"))
    }

    fn setup() -> (TempDir, Project) {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().to_path_buf();

        for ext in ["one", "two"] {
            fs::create_dir_all(dir.join("ext").join(ext)).unwrap();
            fs::create_dir_all(dir.join("tmp/native").join(ext)).unwrap();
            fs::create_dir_all(dir.join("lib/native")).unwrap();
            fs::write(native_artifact(&temp, ext), b"elf").unwrap();
        }

        let project = Project {
            dir,
            config: Config::default(),
        };
        (temp, project)
    }

    #[test]
    fn named_clean_keeps_other_extensions() {
        let (temp, project) = setup();

        let index = project.config.fingerprint_index(&project.dir);
        let store = FingerprintStore::open(index.clone()).unwrap();
        for ext in ["one", "two"] {
            let source = temp.path().join("ext").join(ext).join("x.c");
            fs::write(&source, "int x;").unwrap();
            let extension = Extension::new(ext, vec![source.clone()], project.dir.clone());
            store.record(&extension, "native", &[source]).unwrap();
        }
        store.save().unwrap();

        run(&project, Some("one"), false).unwrap();

        assert!(!temp.path().join("tmp/native/one").exists());
        assert!(temp.path().join("tmp/native/two").exists());
        assert!(native_artifact(&temp, "one").exists());
        assert_eq!(FingerprintStore::open(index).unwrap().len(), 1);
    }

    #[test]
    fn clobber_everything() {
        let (temp, project) = setup();

        run(&project, None, true).unwrap();

        assert!(!temp.path().join("tmp").exists());
        assert!(!native_artifact(&temp, "one").exists());
        assert!(!native_artifact(&temp, "two").exists());
        assert!(temp.path().join("ext/one").exists());
    }
}
