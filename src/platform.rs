//! Platform detection and target resolution
//!
//! Detects the host platform in `RubyGems` format (e.g. "arm64-darwin",
//! "x86_64-linux") and turns a platform request (`native`, `cross`, or a
//! forced platform name) into the ordered list of build targets.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use thiserror::Error;

/// Identifier of the host target
pub const NATIVE: &str = "native";

/// Request keyword expanding to the native target plus all cross targets
pub const CROSS: &str = "cross";

/// Cached platform detection (computed once, reused throughout execution)
static CURRENT_PLATFORM: LazyLock<String> = LazyLock::new(detect_platform_impl);

/// Detect the current platform in `RubyGems` format
///
/// Examples: "x86_64-darwin", "arm64-darwin", "x86_64-linux"
#[must_use]
pub fn detect_current_platform() -> String {
    CURRENT_PLATFORM.clone()
}

fn detect_platform_impl() -> String {
    detect_via_ruby().unwrap_or_else(detect_via_rust)
}

fn detect_via_ruby() -> Option<String> {
    let ruby = crate::env_vars::ruby().unwrap_or_else(|| "ruby".to_string());
    let output = Command::new(ruby)
        .args(["-e", "require 'rbconfig'; puts RbConfig::CONFIG['arch']"])
        .output()
        .ok()?;

    output.status.success().then_some(())?;

    let platform = String::from_utf8(output.stdout).ok()?.trim().to_string();

    (!platform.is_empty()).then_some(platform)
}

fn detect_via_rust() -> String {
    let arch = match env::consts::ARCH {
        "aarch64" => "arm64",
        other => other,
    };

    let os = match env::consts::OS {
        "macos" => "darwin",
        "windows" => "mingw32",
        other => other,
    };

    format!("{arch}-{os}")
}

/// Shared-library suffix Ruby uses for extensions on `platform` (`DLEXT`)
#[must_use]
pub fn binary_ext_for(platform: &str) -> &'static str {
    if platform.contains("darwin") {
        "bundle"
    } else if platform.contains("mingw") || platform.contains("mswin") {
        "dll"
    } else if platform == "java" {
        "jar"
    } else {
        "so"
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Unknown platform '{requested}' (available: {available})")]
    UnknownPlatform { requested: String, available: String },
}

/// What the caller asked to build for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformRequest {
    /// The host platform only
    Native,
    /// The host platform followed by every configured cross platform
    Cross,
    /// Exactly one named platform
    Forced(String),
}

impl From<&str> for PlatformRequest {
    fn from(value: &str) -> Self {
        match value {
            NATIVE => Self::Native,
            CROSS => Self::Cross,
            other => Self::Forced(other.to_string()),
        }
    }
}

impl std::fmt::Display for PlatformRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "{NATIVE}"),
            Self::Cross => write!(f, "{CROSS}"),
            Self::Forced(platform) => write!(f, "{platform}"),
        }
    }
}

/// A concrete build target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTarget {
    /// Target identifier, also the output subdirectory name
    pub id: String,
    /// Platform string handed to the toolchain (the host platform for `native`)
    pub platform: String,
    /// Directory receiving this target's artifacts
    pub output_dir: PathBuf,
    /// Directory holding this target's build trees
    pub build_root: PathBuf,
    /// Shared-library suffix without the dot
    pub binary_ext: &'static str,
    /// `rbconfig.rb` describing the target Ruby, for cross builds
    pub rbconfig: Option<PathBuf>,
    /// Environment added to the toolchain's own
    pub env: BTreeMap<String, String>,
}

impl PlatformTarget {
    /// Whether this target builds for the host
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.id == NATIVE
    }

    /// Final location of `extension`'s binary for this target
    #[must_use]
    pub fn artifact_path(&self, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{extension}.{}", self.binary_ext))
    }

    /// Scratch directory where `extension` is compiled for this target
    #[must_use]
    pub fn build_dir(&self, extension: &str) -> PathBuf {
        self.build_root.join(extension)
    }
}

/// Maps platform requests to build targets
#[derive(Debug, Clone)]
pub struct PlatformResolver {
    host_platform: String,
    cross_platforms: Vec<String>,
    rbconfig: BTreeMap<String, PathBuf>,
    toolchain: BTreeMap<String, BTreeMap<String, String>>,
    lib_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl PlatformResolver {
    /// Create a resolver for the detected host platform.
    ///
    /// Configured cross platforms keep their order; duplicates and explicit
    /// `native` entries are dropped.
    #[must_use]
    pub fn new(lib_dir: PathBuf, tmp_dir: PathBuf, cross_platforms: &[String]) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(cross_platforms.len());
        for platform in cross_platforms {
            if platform != NATIVE && platform != CROSS && !unique.contains(platform) {
                unique.push(platform.clone());
            }
        }

        Self {
            host_platform: detect_current_platform(),
            cross_platforms: unique,
            rbconfig: BTreeMap::new(),
            toolchain: BTreeMap::new(),
            lib_dir,
            tmp_dir,
        }
    }

    /// Create a resolver from a loaded configuration
    #[must_use]
    pub fn from_config(project_dir: &Path, config: &crate::Config) -> Self {
        Self::new(
            config.lib_dir(project_dir),
            config.tmp_dir(project_dir),
            &config.cross_platforms,
        )
        .with_rbconfig(config.rbconfig_paths(project_dir))
        .with_toolchain(config.toolchain.clone())
    }

    /// Override the detected host platform
    #[must_use]
    pub fn with_host(mut self, host_platform: impl Into<String>) -> Self {
        self.host_platform = host_platform.into();
        self
    }

    /// Attach `rbconfig.rb` paths for cross platforms
    #[must_use]
    pub fn with_rbconfig(mut self, rbconfig: BTreeMap<String, PathBuf>) -> Self {
        self.rbconfig = rbconfig;
        self
    }

    /// Attach per-target toolchain environment
    #[must_use]
    pub fn with_toolchain(mut self, toolchain: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// Host platform used for the `native` target
    #[must_use]
    pub fn host_platform(&self) -> &str {
        &self.host_platform
    }

    /// All target identifiers, native first
    #[must_use]
    pub fn available(&self) -> Vec<&str> {
        std::iter::once(NATIVE)
            .chain(self.cross_platforms.iter().map(String::as_str))
            .collect()
    }

    /// Resolve a request into targets, in configured order.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::UnknownPlatform` if a forced platform is
    /// neither `native` nor a configured cross platform.
    pub fn resolve(&self, request: &PlatformRequest) -> Result<Vec<PlatformTarget>, PlatformError> {
        match request {
            PlatformRequest::Native => Ok(vec![self.native_target()]),
            PlatformRequest::Cross => Ok(std::iter::once(self.native_target())
                .chain(self.cross_platforms.iter().map(|p| self.cross_target(p)))
                .collect()),
            PlatformRequest::Forced(platform) => self
                .target_for(platform)
                .map(|target| vec![target])
                .ok_or_else(|| PlatformError::UnknownPlatform {
                    requested: platform.clone(),
                    available: self.available().join(", "),
                }),
        }
    }

    /// Look up a single target by identifier
    #[must_use]
    pub fn target_for(&self, id: &str) -> Option<PlatformTarget> {
        if id == NATIVE {
            return Some(self.native_target());
        }
        self.cross_platforms
            .iter()
            .find(|p| *p == id)
            .map(|p| self.cross_target(p))
    }

    /// Find the target whose output directory is `dir`
    #[must_use]
    pub fn target_for_output_dir(&self, dir: &Path) -> Option<PlatformTarget> {
        self.available()
            .into_iter()
            .filter_map(|id| self.target_for(id))
            .find(|target| target.output_dir == dir)
    }

    fn native_target(&self) -> PlatformTarget {
        PlatformTarget {
            id: NATIVE.to_string(),
            platform: self.host_platform.clone(),
            output_dir: self.lib_dir.join(NATIVE),
            build_root: self.tmp_dir.join(NATIVE),
            binary_ext: binary_ext_for(&self.host_platform),
            rbconfig: None,
            env: self.toolchain.get(NATIVE).cloned().unwrap_or_default(),
        }
    }

    fn cross_target(&self, platform: &str) -> PlatformTarget {
        PlatformTarget {
            id: platform.to_string(),
            platform: platform.to_string(),
            output_dir: self.lib_dir.join(platform),
            build_root: self.tmp_dir.join(platform),
            binary_ext: binary_ext_for(platform),
            rbconfig: self.rbconfig.get(platform).cloned(),
            env: self.toolchain.get(platform).cloned().unwrap_or_default(),
        }
    }
}
