//! Debug logging utilities
//!
//! Debug output is switched on by the global `--debug` flag or the
//! `KILN_DEBUG` environment variable. When disabled, logging costs a single
//! atomic load.

use std::sync::OnceLock;

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Initialize debug mode from the command-line flag
///
/// `KILN_DEBUG` turns debugging on even when the flag is absent. Only the
/// first call has any effect.
pub fn init_debug(enabled: bool) {
    let _ = DEBUG_ENABLED.set(enabled || crate::env_vars::kiln_debug());
}

/// Check if debug mode is enabled
pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.get().copied().unwrap_or(false)
}

/// Macro for convenient debug logging
///
/// Usage: `debug!("compiling {} for {}", name, platform)`
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        if $crate::debug::is_debug_enabled() {
            eprintln!("[DEBUG] {}", format_args!($($arg)*));
        }
    };
}
