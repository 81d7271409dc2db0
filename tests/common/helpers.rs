//! Shared test helpers and utilities

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Path to the kiln binary built for this test run
#[allow(dead_code)]
pub(crate) fn get_kiln_binary() -> String {
    env!("CARGO_BIN_EXE_kiln").to_string()
}

/// Create a project with `ext/<name>/extconf.rb` and `ext/<name>/<name>.c`
///
/// Returns the source files, extconf first.
#[allow(dead_code)]
pub(crate) fn create_extension(temp_dir: &TempDir, name: &str) -> Vec<PathBuf> {
    let ext_dir = temp_dir.path().join("ext").join(name);
    fs::create_dir_all(&ext_dir).expect("Failed to create ext dir");

    let extconf = ext_dir.join("extconf.rb");
    fs::write(&extconf, format!("require \"mkmf\"\ncreate_makefile(\"{name}\")\n"))
        .expect("Failed to write extconf.rb");

    let source = ext_dir.join(format!("{name}.c"));
    fs::write(&source, format!("void Init_{name}(void) {{}}\n")).expect("Failed to write source");

    vec![extconf, source]
}

/// Write a `.kiln.toml` listing `platforms` for cross-compilation
#[allow(dead_code)]
pub(crate) fn write_cross_config(temp_dir: &TempDir, platforms: &[&str]) {
    let list = platforms
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ");
    fs::write(
        temp_dir.path().join(".kiln.toml"),
        format!("cross_platforms = [{list}]\n"),
    )
    .expect("Failed to write .kiln.toml");
}

/// Move a file's modification time forward without sleeping
#[allow(dead_code)]
pub(crate) fn touch_later(path: &Path) {
    let file = fs::File::options()
        .append(true)
        .open(path)
        .expect("Failed to open file for touch");
    let later = SystemTime::now() + Duration::from_secs(5);
    file.set_modified(later).expect("Failed to set mtime");
}
