//! mkmf compiler backend
//!
//! Compiles an extension with the standard `extconf.rb` + `make` workflow,
//! out of tree, one build directory per target. For a cross target it is
//! the equivalent of:
//! ```bash
//! mkdir -p tmp/x86-mingw32/extension_one && cd tmp/x86-mingw32/extension_one
//! ruby -I/path/to/mingw/rbconfig ../../../ext/extension_one/extconf.rb
//! make
//! ```

use super::builder::{CompileOutput, CompilerBackend};
use super::types::{BuildError, Extension};
use crate::platform::PlatformTarget;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Suffixes accepted for a native build when the expected one is missing
const ARTIFACT_SUFFIXES: &[&str] = &["so", "bundle", "dll"];

/// `extconf.rb` + `make` backend
///
/// 1. Run `ruby extconf.rb` in `tmp/<platform>/<extension>/`, with the
///    target's `rbconfig.rb` on the load path when cross-compiling
/// 2. Run `make`
/// 3. Hand the compiled `<extension>.<dlext>` back to the orchestrator
#[derive(Debug)]
pub struct MkmfBackend {
    /// Path to Ruby executable
    ruby_path: PathBuf,
    /// make executable
    make_command: String,
    /// Bound on each step
    timeout: Option<Duration>,
    /// Echo each step and its output
    verbose: bool,
}

impl MkmfBackend {
    /// Create a new mkmf backend
    ///
    /// Finds the Ruby executable automatically.
    /// Priority order:
    /// 1. RUBY environment variable
    /// 2. `ruby` in PATH
    ///
    /// # Errors
    ///
    /// Returns an error if Ruby executable cannot be found.
    pub fn new(verbose: bool, timeout: Option<Duration>) -> Result<Self> {
        let ruby_path = Self::find_ruby_executable()
            .context("Ruby executable not found. Native extensions require Ruby to be installed.")?;
        let make_command = crate::env_vars::make_command().unwrap_or_else(|| "make".to_string());

        Ok(Self {
            ruby_path,
            make_command,
            timeout,
            verbose,
        })
    }

    /// Find Ruby executable on the system
    ///
    /// Checks RUBY env var first, then PATH
    fn find_ruby_executable() -> Result<PathBuf> {
        if let Some(ruby_env) = crate::env_vars::ruby() {
            let path = PathBuf::from(ruby_env);
            if path.exists() {
                return Ok(path);
            }
        }

        if let Ok(output) = Command::new("which").arg("ruby").output()
            && output.status.success()
        {
            let path_str = String::from_utf8_lossy(&output.stdout);
            let path = PathBuf::from(path_str.trim());
            if path.exists() {
                return Ok(path);
            }
        }

        anyhow::bail!("Ruby executable not found in PATH or RUBY environment variable")
    }

    fn extconf_command(&self, extconf: &Path, target: &PlatformTarget, build_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.ruby_path);

        // A target rbconfig.rb shadows the host one when its directory leads the load path
        if let Some(rbconfig_dir) = target.rbconfig.as_deref().and_then(Path::parent) {
            cmd.arg(format!("-I{}", rbconfig_dir.display()));
        }

        cmd.arg(extconf).current_dir(build_dir).envs(&target.env);
        cmd
    }

    fn make_invocation(&self, target: &PlatformTarget, build_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.make_command);
        cmd.current_dir(build_dir).envs(&target.env);
        cmd
    }

    /// Run one step, appending its output to `log`
    fn run_step(&self, step: &'static str, mut cmd: Command, log: &mut String) -> Result<(), BuildError> {
        if self.verbose {
            println!("  Running: {cmd:?}");
        }

        let child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BuildError::Compile {
                step,
                diagnostic: format!("failed to start: {e}"),
            })?;

        let output = match run_with_timeout(child, self.timeout) {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(BuildError::Timeout {
                    step,
                    timeout: self.timeout.unwrap_or_default(),
                });
            }
            Err(e) => {
                return Err(BuildError::Compile {
                    step,
                    diagnostic: e.to_string(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        log.push_str(&stdout);
        log.push_str(&stderr);

        if self.verbose {
            print!("{stdout}");
            eprint!("{stderr}");
        }

        if output.status.success() {
            return Ok(());
        }

        let code = output
            .status
            .code()
            .map_or_else(|| "unknown".to_string(), |c| c.to_string());
        let detail = if stderr.trim().is_empty() { stdout } else { stderr };
        Err(BuildError::Compile {
            step,
            diagnostic: format!("exit code {code}\n{}", detail.trim_end()),
        })
    }
}

impl CompilerBackend for MkmfBackend {
    fn compile(
        &self,
        extension: &Extension,
        target: &PlatformTarget,
    ) -> Result<CompileOutput, BuildError> {
        let extconf = extension.extconf().ok_or_else(|| BuildError::Compile {
            step: "extconf.rb",
            diagnostic: format!("no extconf.rb in {}", extension.source_dir().display()),
        })?;
        // Without a target rbconfig.rb the host Ruby would produce a host binary
        if !target.is_native() && target.rbconfig.is_none() {
            return Err(BuildError::Compile {
                step: "extconf.rb",
                diagnostic: format!("no rbconfig configured for {}", target.platform),
            });
        }
        // The build runs from tmp/, so a relative path would not resolve
        let extconf = std::path::absolute(extconf).map_err(|e| BuildError::io(extconf, e))?;

        let build_dir = target.build_dir(&extension.name);
        std::fs::create_dir_all(&build_dir).map_err(|e| BuildError::io(&build_dir, e))?;

        if self.verbose {
            println!("Compiling {} for {}", extension.name, target.id);
            println!("  build dir: {}", build_dir.display());
        }

        let mut log = String::new();
        self.run_step(
            "extconf.rb",
            self.extconf_command(&extconf, target, &build_dir),
            &mut log,
        )?;
        self.run_step("make", self.make_invocation(target, &build_dir), &mut log)?;

        let artifact = find_artifact(&build_dir, &extension.name, target)?;
        let bytes = std::fs::read(&artifact).map_err(|e| BuildError::io(&artifact, e))?;

        Ok(CompileOutput { bytes, log })
    }
}

/// Locate the shared library make produced in `build_dir`
///
/// Cross targets accept only `<name>.<binary_ext>`. A native build also
/// accepts any `<name>.{so,bundle,dll}`.
fn find_artifact(build_dir: &Path, name: &str, target: &PlatformTarget) -> Result<PathBuf, BuildError> {
    let fallbacks: &[&str] = if target.is_native() { ARTIFACT_SUFFIXES } else { &[] };
    std::iter::once(target.binary_ext)
        .chain(fallbacks.iter().copied())
        .map(|ext| build_dir.join(format!("{name}.{ext}")))
        .find(|path| path.is_file())
        .ok_or_else(|| BuildError::MissingArtifact {
            dir: build_dir.to_path_buf(),
        })
}

/// Wait for `child`, killing it once `timeout` elapses.
///
/// Output pipes are drained on separate threads so a chatty child can't
/// block on a full pipe while we poll.
fn run_with_timeout(mut child: Child, timeout: Option<Duration>) -> std::io::Result<Output> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let start = Instant::now();

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if let Some(limit) = timeout
            && start.elapsed() > limit
        {
            child.kill().ok();
            child.wait().ok();
            return Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("command timed out after {limit:?}"),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).ok();
        }
        buf
    })
}
