//! Extension build orchestration
//!
//! Decides, per target, whether an extension needs compiling, drives the
//! compiler backend, installs the artifact under `lib/<platform>/`, and
//! records the source fingerprint once a build succeeds.

use super::fingerprint::{BuildFingerprint, FingerprintStore};
use super::types::{BuildError, BuildOutcome, BuildResult, Extension};
use crate::platform::{PlatformRequest, PlatformResolver, PlatformTarget};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

/// Compiled artifact handed back by a backend
#[derive(Debug, Clone, Default)]
pub struct CompileOutput {
    /// Shared library contents
    pub bytes: Vec<u8>,
    /// Toolchain output (stdout + stderr)
    pub log: String,
}

/// A toolchain able to compile an extension for a target
///
/// Implementations must not write the final artifact themselves; the
/// orchestrator installs the returned bytes so a failed build never leaves
/// a binary behind.
pub trait CompilerBackend: Send + Sync {
    /// Compile `extension` for `target`.
    ///
    /// # Errors
    ///
    /// Returns a `BuildError` describing why compilation failed.
    fn compile(
        &self,
        extension: &Extension,
        target: &PlatformTarget,
    ) -> Result<CompileOutput, BuildError>;
}

/// Counts over a set of build results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,
}

/// Extension build coordinator
///
/// Owns the fingerprint store for the session. Targets are independent: a
/// failure on one never stops the others, and every target yields exactly
/// one `BuildResult`.
pub struct BuildOrchestrator<B> {
    backend: B,
    store: FingerprintStore,
    /// Rebuild even when sources are unchanged
    force: bool,
    /// Targets compiled concurrently
    jobs: usize,
    progress: Option<ProgressBar>,
}

impl<B> std::fmt::Debug for BuildOrchestrator<B>
where
    B: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("backend", &self.backend)
            .field("store", &self.store)
            .field("force", &self.force)
            .field("jobs", &self.jobs)
            .finish_non_exhaustive()
    }
}

impl<B: CompilerBackend> BuildOrchestrator<B> {
    /// Create an orchestrator building sequentially with `backend`
    #[must_use]
    pub fn new(backend: B, store: FingerprintStore) -> Self {
        Self {
            backend,
            store,
            force: false,
            jobs: 1,
            progress: None,
        }
    }

    /// Ignore fingerprints and rebuild every target
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Compile up to `jobs` targets at once
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Advance `progress` once per finished target
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Fingerprints recorded so far
    #[must_use]
    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    /// Give back the fingerprint store, e.g. to save it
    #[must_use]
    pub fn into_store(self) -> FingerprintStore {
        self.store
    }

    /// Build `extension` for every target, returning results in target order
    #[must_use]
    pub fn build(&self, extension: &Extension, targets: &[PlatformTarget]) -> Vec<BuildResult> {
        if self.jobs > 1 && targets.len() > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
                Ok(pool) => {
                    return pool.install(|| {
                        targets
                            .par_iter()
                            .map(|target| self.build_target(extension, target))
                            .collect()
                    });
                }
                Err(e) => crate::debug!("Falling back to sequential builds: {e}"),
            }
        }

        targets
            .iter()
            .map(|target| self.build_target(extension, target))
            .collect()
    }

    /// Resolve `request` and build for the resulting targets
    ///
    /// An unresolvable request still yields a single failed result, keyed by
    /// the requested platform name.
    #[must_use]
    pub fn build_requested(
        &self,
        extension: &Extension,
        resolver: &PlatformResolver,
        request: &PlatformRequest,
    ) -> Vec<BuildResult> {
        match resolver.resolve(request) {
            Ok(targets) => self.build(extension, &targets),
            Err(e) => vec![BuildResult::failure(
                &extension.name,
                &request.to_string(),
                e.into(),
                Duration::ZERO,
                String::new(),
            )],
        }
    }

    /// Build `extension` for a single target
    #[must_use]
    pub fn build_target(&self, extension: &Extension, target: &PlatformTarget) -> BuildResult {
        let result = self.run_target(extension, target);
        crate::debug!(
            "{} [{}]: {} in {:?}",
            extension.name,
            target.id,
            result.outcome,
            result.duration
        );
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }
        result
    }

    fn run_target(&self, extension: &Extension, target: &PlatformTarget) -> BuildResult {
        let artifact = target.artifact_path(&extension.name);

        // A deleted artifact is rebuilt even if the sources are unchanged
        if !self.force && artifact.is_file() && !self.store.is_stale(extension, &target.id) {
            return BuildResult::skipped(&extension.name, &target.id, artifact);
        }

        let start = Instant::now();
        let fail = |error: BuildError, output: String| {
            discard_artifact(&artifact);
            BuildResult::failure(&extension.name, &target.id, error, start.elapsed(), output)
        };

        // Stamp before compiling so edits made mid-build still count as changes
        let fingerprint = match BuildFingerprint::capture(&extension.sources) {
            Ok(fingerprint) => fingerprint,
            Err(e) => return fail(e, String::new()),
        };

        let compiled = match self.backend.compile(extension, target) {
            Ok(compiled) => compiled,
            Err(e) => return fail(e, String::new()),
        };

        if let Err(e) = install_artifact(&artifact, &compiled.bytes) {
            return fail(e, compiled.log);
        }

        self.store.commit(extension, &target.id, fingerprint);

        BuildResult::success(
            &extension.name,
            &target.id,
            artifact,
            start.elapsed(),
            compiled.log,
        )
    }

    /// Tally results by outcome
    #[must_use]
    pub fn summarize(results: &[BuildResult]) -> BuildSummary {
        results
            .iter()
            .fold(BuildSummary::default(), |mut summary, result| {
                match result.outcome {
                    BuildOutcome::Success => summary.succeeded += 1,
                    BuildOutcome::Failed => summary.failed += 1,
                    BuildOutcome::Skipped => summary.skipped += 1,
                }
                summary.duration += result.duration;
                summary
            })
    }
}

/// Write `bytes` to `artifact` via a temp file in the same directory, so the
/// artifact is either complete or absent.
fn install_artifact(artifact: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    let dir = artifact
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| BuildError::io(dir, e))?;
    if let Err(e) = tmp.write_all(bytes).and_then(|()| tmp.flush()) {
        return Err(BuildError::io(tmp.path(), e));
    }
    tmp.persist(artifact)
        .map_err(|e| BuildError::io(artifact, e.error))?;

    Ok(())
}

/// Remove an artifact left from an earlier build of a now-failed target
fn discard_artifact(artifact: &Path) {
    match fs::remove_file(artifact) {
        Ok(()) => crate::debug!("Removed outdated artifact {}", artifact.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => crate::debug!("Could not remove {}: {e}", artifact.display()),
    }
}
