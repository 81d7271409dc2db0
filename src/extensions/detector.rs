//! Extension discovery
//!
//! Collects the source files of `ext/<name>/` in a project. Files are
//! returned in a stable order so fingerprints and builds see the same list
//! every run.

use super::types::{BuildError, Extension};
use std::path::Path;
use walkdir::WalkDir;

/// File suffixes that count as extension sources
///
/// C and C++ sources and headers, Objective-C, and Ruby (`extconf.rb` and
/// any helpers it requires).
const SOURCE_SUFFIXES: &[&str] = &["c", "cc", "cpp", "cxx", "h", "hh", "hpp", "m", "rb"];

/// Whether `path` looks like an extension source file
#[must_use]
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SOURCE_SUFFIXES.contains(&ext))
}

/// Locate the extension `name` under `<project_dir>/ext/<name>/`
///
/// Walks the directory recursively, sorted by file name, skipping hidden
/// entries.
///
/// # Example
///
/// ```rust,ignore
/// use kiln::extensions::discover_extension;
/// use std::path::Path;
///
/// let ext = discover_extension(Path::new("."), "extension_one")?;
/// assert!(ext.extconf().is_some());
/// ```
///
/// # Errors
///
/// Returns `BuildError::Io` if the directory cannot be read and
/// `BuildError::NoSources` if it holds no source files.
pub fn discover_extension(project_dir: &Path, name: &str) -> Result<Extension, BuildError> {
    let ext_dir = project_dir.join("ext").join(name);

    if !ext_dir.is_dir() {
        return Err(BuildError::io(
            &ext_dir,
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "extension directory not found",
            ),
        ));
    }

    let mut sources = Vec::new();
    let walker = WalkDir::new(&ext_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(&ext_dir).to_path_buf();
            BuildError::io(&path, e.into())
        })?;
        if entry.file_type().is_file() && is_source_file(entry.path()) {
            sources.push(entry.into_path());
        }
    }

    if sources.is_empty() {
        return Err(BuildError::NoSources { dir: ext_dir });
    }

    crate::debug!("Found {} source file(s) for {name}", sources.len());

    Ok(Extension::new(name, sources, project_dir.to_path_buf()))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}
