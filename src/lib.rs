//! Kiln internal library code

pub mod config;
pub mod debug;
pub mod env_vars;
pub mod extensions;
pub mod platform;
pub mod scaffold;

// Re-export common types for convenience
pub use config::Config;
pub use debug::{init_debug, is_debug_enabled};
pub use extensions::{
    ArtifactVerifier, BuildError, BuildFingerprint, BuildOrchestrator, BuildOutcome, BuildResult,
    BuildSummary, CompileOutput, CompilerBackend, Extension, FingerprintStore, MkmfBackend,
    discover_extension,
};
pub use platform::{
    PlatformError, PlatformRequest, PlatformResolver, PlatformTarget, binary_ext_for,
    detect_current_platform,
};
pub use scaffold::{enable_cross_compilation, generate_extension};
