//! Native extension building
//!
//! Compiles the native extensions of a gem project, one artifact per target
//! platform, and skips targets whose sources did not change since their last
//! successful build.
//!
//! Pieces, leaf first:
//! - `detector` finds an extension's sources under `ext/<name>/`
//! - `fingerprint` tracks source mtimes and answers "is this stale?"
//! - `mkmf` compiles with `extconf.rb` + `make`
//! - `builder` sequences builds across targets
//! - `verifier` checks for built artifacts

pub mod builder;
pub mod detector;
pub mod fingerprint;
pub mod mkmf;
pub mod types;
pub mod verifier;

pub use builder::{BuildOrchestrator, BuildSummary, CompileOutput, CompilerBackend};
pub use detector::{discover_extension, is_source_file};
pub use fingerprint::{BuildFingerprint, FileStamp, FingerprintError, FingerprintStore};
pub use mkmf::MkmfBackend;
pub use types::{BuildError, BuildOutcome, BuildResult, Extension};
pub use verifier::ArtifactVerifier;
