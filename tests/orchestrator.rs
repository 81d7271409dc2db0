mod common;

use kiln::{
    ArtifactVerifier, BuildError, BuildOrchestrator, CompileOutput, CompilerBackend, Extension,
    FingerprintStore, PlatformError, PlatformRequest, PlatformResolver, PlatformTarget,
    discover_extension,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use common::helpers::{create_extension, touch_later};

/// Backend producing a fake binary named after the target
#[derive(Debug, Default)]
struct FakeBackend {
    broken: Option<&'static str>,
}

impl CompilerBackend for FakeBackend {
    fn compile(
        &self,
        extension: &Extension,
        target: &PlatformTarget,
    ) -> Result<CompileOutput, BuildError> {
        if self.broken == Some(target.id.as_str()) {
            return Err(BuildError::Compile {
                step: "make",
                diagnostic: "error: expected ';' before '}' token".to_string(),
            });
        }
        Ok(CompileOutput {
            bytes: format!("{} for {}", extension.name, target.platform).into_bytes(),
            log: String::new(),
        })
    }
}

fn cross_resolver(project: &Path) -> PlatformResolver {
    PlatformResolver::new(
        project.join("lib"),
        project.join("tmp"),
        &["x86-mingw32".to_string(), "x86_64-linux".to_string()],
    )
    .with_host("x86_64-linux")
}

#[test]
fn cross_build_places_one_artifact_per_platform() {
    let temp = TempDir::new().unwrap();
    create_extension(&temp, "extension_one");
    let extension = discover_extension(temp.path(), "extension_one").unwrap();
    let resolver = cross_resolver(temp.path());

    let targets = resolver.resolve(&PlatformRequest::Cross).unwrap();
    let ids: Vec<&str> = targets.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["native", "x86-mingw32", "x86_64-linux"]);

    let orchestrator = BuildOrchestrator::new(FakeBackend::default(), FingerprintStore::new());
    let results = orchestrator.build(&extension, &targets);

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(kiln::BuildResult::is_success));

    let verifier = ArtifactVerifier::new(temp.path().to_path_buf(), resolver);
    assert!(verifier.exists("extension_one", Path::new("lib/native")));
    assert!(verifier.exists("extension_one", Path::new("lib/x86-mingw32")));
    assert!(verifier.exists("extension_one", Path::new("lib/x86_64-linux")));
    assert!(temp.path().join("lib/x86-mingw32/extension_one.dll").is_file());
    assert!(temp.path().join("lib/x86_64-linux/extension_one.so").is_file());
}

#[test]
fn unchanged_project_skips_every_platform() {
    let temp = TempDir::new().unwrap();
    create_extension(&temp, "extension_one");
    let extension = discover_extension(temp.path(), "extension_one").unwrap();
    let targets = cross_resolver(temp.path())
        .resolve(&PlatformRequest::Cross)
        .unwrap();

    let orchestrator = BuildOrchestrator::new(FakeBackend::default(), FingerprintStore::new());
    let first = orchestrator.build(&extension, &targets);
    assert!(first.iter().all(kiln::BuildResult::is_success));

    let second = orchestrator.build(&extension, &targets);
    assert!(second.iter().all(kiln::BuildResult::is_skipped));

    let summary = BuildOrchestrator::<FakeBackend>::summarize(&second);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.succeeded, 0);
}

#[test]
fn touched_source_makes_every_platform_stale() {
    let temp = TempDir::new().unwrap();
    let sources = create_extension(&temp, "extension_one");
    let extension = discover_extension(temp.path(), "extension_one").unwrap();
    let targets = cross_resolver(temp.path())
        .resolve(&PlatformRequest::Cross)
        .unwrap();

    let orchestrator = BuildOrchestrator::new(FakeBackend::default(), FingerprintStore::new());
    let results = orchestrator.build(&extension, &targets);
    assert!(results.iter().all(kiln::BuildResult::is_success));

    touch_later(sources.get(1).unwrap());

    for target in &targets {
        assert!(orchestrator.store().is_stale(&extension, &target.id));
    }

    let rebuilt = orchestrator.build(&extension, &targets);
    assert!(rebuilt.iter().all(kiln::BuildResult::is_success));
}

#[test]
fn forced_platform_builds_only_that_platform() {
    let temp = TempDir::new().unwrap();
    create_extension(&temp, "extension_one");
    let extension = discover_extension(temp.path(), "extension_one").unwrap();
    let resolver = cross_resolver(temp.path());

    let targets = resolver
        .resolve(&PlatformRequest::from("x86-mingw32"))
        .unwrap();
    let orchestrator = BuildOrchestrator::new(FakeBackend::default(), FingerprintStore::new());
    let results = orchestrator.build(&extension, &targets);

    assert_eq!(results.len(), 1);
    assert_eq!(results.first().unwrap().platform, "x86-mingw32");
    assert!(temp.path().join("lib/x86-mingw32/extension_one.dll").is_file());
    assert!(!temp.path().join("lib/native").exists());
    assert!(!temp.path().join("lib/x86_64-linux").exists());
}

#[test]
fn unknown_platform_is_rejected() {
    let temp = TempDir::new().unwrap();
    let resolver = cross_resolver(temp.path());

    let err = resolver
        .resolve(&PlatformRequest::from("sparc-solaris"))
        .unwrap_err();
    let PlatformError::UnknownPlatform { requested, available } = err;
    assert_eq!(requested, "sparc-solaris");
    assert!(available.contains("x86-mingw32"));
}

#[test]
fn failed_platform_leaves_no_artifact() {
    let temp = TempDir::new().unwrap();
    create_extension(&temp, "extension_one");
    let extension = discover_extension(temp.path(), "extension_one").unwrap();
    let resolver = cross_resolver(temp.path());
    let targets = resolver.resolve(&PlatformRequest::Cross).unwrap();

    let backend = FakeBackend {
        broken: Some("x86-mingw32"),
    };
    let orchestrator = BuildOrchestrator::new(backend, FingerprintStore::new());
    let results = orchestrator.build(&extension, &targets);

    assert!(results.first().unwrap().is_success());
    assert!(results.get(1).unwrap().is_failure());
    assert!(results.get(2).unwrap().is_success());
    assert!(matches!(results.get(1).unwrap().error, Some(BuildError::Compile { .. })));

    let verifier = ArtifactVerifier::new(temp.path().to_path_buf(), resolver);
    assert!(!verifier.exists("extension_one", Path::new("lib/x86-mingw32")));
    assert!(orchestrator.store().is_stale(&extension, "x86-mingw32"));
}

#[test]
fn fingerprints_survive_a_reload() {
    let temp = TempDir::new().unwrap();
    create_extension(&temp, "extension_one");
    let extension = discover_extension(temp.path(), "extension_one").unwrap();
    let targets = cross_resolver(temp.path())
        .resolve(&PlatformRequest::Native)
        .unwrap();
    let index = temp.path().join("tmp/kiln-fingerprints.json");

    let store = FingerprintStore::open(index.clone()).unwrap();
    let orchestrator = BuildOrchestrator::new(FakeBackend::default(), store);
    let results = orchestrator.build(&extension, &targets);
    assert!(results.first().unwrap().is_success());
    orchestrator.store().save().unwrap();

    let backend = FakeBackend::default();
    let reloaded = BuildOrchestrator::new(backend, FingerprintStore::open(index).unwrap());
    assert!(!reloaded.store().is_stale(&extension, "native"));

    let results = reloaded.build(&extension, &targets);
    assert!(results.first().unwrap().is_skipped());
}

#[test]
fn parallel_cross_build_compiles_each_platform_once() {
    let temp = TempDir::new().unwrap();
    create_extension(&temp, "extension_one");
    let extension = discover_extension(temp.path(), "extension_one").unwrap();
    let targets = cross_resolver(temp.path())
        .resolve(&PlatformRequest::Cross)
        .unwrap();

    let orchestrator =
        BuildOrchestrator::new(FakeBackend::default(), FingerprintStore::new()).with_jobs(3);
    let results = orchestrator.build(&extension, &targets);

    let platforms: Vec<&str> = results.iter().map(|r| r.platform.as_str()).collect();
    assert_eq!(platforms, ["native", "x86-mingw32", "x86_64-linux"]);

    let store = orchestrator.into_store();
    assert_eq!(store.len(), 3);

    let contents = fs::read_to_string(temp.path().join("lib/x86-mingw32/extension_one.dll")).unwrap();
    assert_eq!(contents, "extension_one for x86-mingw32");
}
