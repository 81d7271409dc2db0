//! Environment variable handling.
//!
//! Kiln settings can be overridden from the environment. Toolchain
//! variables such as `CC` reach `extconf.rb` and `make` through normal
//! inheritance; per-target overrides live in the `[toolchain]` config table.

use std::env;

// Helper for boolean environment variables that accept "1", "true", "yes"
fn is_enabled(var: &str) -> bool {
    env::var(var).ok().is_some_and(|s| {
        let s = s.to_lowercase();
        s == "1" || s == "true" || s == "yes"
    })
}

// Colon or space separated list, empty entries dropped
fn list(var: &str) -> Option<Vec<String>> {
    env::var(var).ok().map(|s| {
        s.split([':', ' '])
            .filter(|s| !s.is_empty())
            .map(std::string::ToString::to_string)
            .collect()
    })
}

/// Whether `KILN_DEBUG` requests debug output.
pub fn kiln_debug() -> bool {
    is_enabled("KILN_DEBUG")
}

/// Cross-compilation platforms from `KILN_CROSS_PLATFORMS` (colon/space-separated).
pub fn cross_platforms() -> Option<Vec<String>> {
    list("KILN_CROSS_PLATFORMS")
}

/// Number of parallel target builds from `KILN_JOBS` (returns None if not set or invalid).
pub fn jobs() -> Option<usize> {
    env::var("KILN_JOBS").ok().and_then(|s| s.parse().ok())
}

/// Per-step compile timeout in seconds from `KILN_TIMEOUT`.
pub fn compile_timeout_secs() -> Option<u64> {
    env::var("KILN_TIMEOUT").ok().and_then(|s| s.parse().ok())
}

/// Explicit Ruby interpreter from `RUBY`.
pub fn ruby() -> Option<String> {
    env::var("RUBY").ok()
}

/// Get make command (`MAKE`, defaults to `make` at the call site).
pub fn make_command() -> Option<String> {
    env::var("MAKE").ok()
}
