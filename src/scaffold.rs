//! Extension scaffolding
//!
//! Generates the skeleton of a new native extension: an `extconf.rb` and a
//! C file defining `Init_<name>`.

use crate::config::{Config, PROJECT_CONFIG_FILE};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Template for extconf.rb
const EXTCONF_TEMPLATE: &str = r#"# frozen_string_literal: true

require "mkmf"

create_makefile("{name}")
"#;

/// Template for the extension's C entry point
const SOURCE_TEMPLATE: &str = r#"#include "ruby.h"

static VALUE
{name}_hello(VALUE self)
{
    return rb_str_new_cstr("hello from {name}");
}

void
Init_{name}(void)
{
    VALUE mod = rb_define_module("{module}");
    rb_define_module_function(mod, "hello", {name}_hello, 0);
}
"#;

/// Whether `name` can be used as an extension (and C identifier) name
#[must_use]
pub fn is_valid_extension_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `extension_one` -> `ExtensionOne`
fn module_name(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect()
}

/// Write `ext/<name>/extconf.rb` and `ext/<name>/<name>.c` under `project_dir`
///
/// Returns the created files.
///
/// # Errors
///
/// Returns an error if the name is not a valid identifier, the extension
/// already exists, or the files cannot be written.
pub fn generate_extension(project_dir: &Path, name: &str) -> Result<Vec<PathBuf>> {
    if !is_valid_extension_name(name) {
        anyhow::bail!(
            "Invalid extension name '{name}': use letters, digits and underscores, not starting with a digit"
        );
    }

    let ext_dir = project_dir.join("ext").join(name);
    if ext_dir.exists() {
        anyhow::bail!("Extension already exists at {}", ext_dir.display());
    }

    fs::create_dir_all(&ext_dir)
        .with_context(|| format!("Failed to create directory {}", ext_dir.display()))?;

    let files = [
        (
            ext_dir.join("extconf.rb"),
            EXTCONF_TEMPLATE.replace("{name}", name),
        ),
        (
            ext_dir.join(format!("{name}.c")),
            SOURCE_TEMPLATE
                .replace("{module}", &module_name(name))
                .replace("{name}", name),
        ),
    ];

    for (path, content) in &files {
        fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(files.into_iter().map(|(path, _)| path).collect())
}

/// Add `platforms` to the project's cross-compilation list in `.kiln.toml`
///
/// Creates the file if needed and keeps any platforms already listed.
///
/// # Errors
///
/// Returns an error if an existing `.kiln.toml` cannot be parsed or the file
/// cannot be written.
pub fn enable_cross_compilation(project_dir: &Path, platforms: &[String]) -> Result<PathBuf> {
    let path = project_dir.join(PROJECT_CONFIG_FILE);

    let mut config = if path.exists() {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        Config::default()
    };

    for platform in platforms {
        if !config.cross_platforms.contains(platform) {
            config.cross_platforms.push(platform.clone());
        }
    }

    let contents = toml::to_string_pretty(&config).context("Failed to serialize config")?;
    fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}
