//! Kiln command-line interface
//!
//! Incremental, cross-platform compiler for Ruby native extensions

use clap::{Parser, Subcommand};
use std::process;

/// Display an error with optional backtrace information
fn display_error(err: &anyhow::Error, backtrace_enabled: bool) {
    eprintln!("error: {err}");

    // Show error chain
    let mut source = err.source();
    while let Some(err) = source {
        eprintln!("caused by: {err}");
        source = err.source();
    }

    if backtrace_enabled {
        let backtrace = err.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            eprintln!("\nBacktrace:");
            eprintln!("{backtrace}");
        }
    }
}

#[derive(Parser)]
#[command(name = "kiln")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile Ruby native extensions, natively and cross-platform", long_about = None)]
pub(crate) struct Cli {
    /// Project root containing ext/ and lib/
    #[arg(short = 'C', long = "directory", global = true, default_value = ".")]
    directory: String,

    /// Use this config file instead of .kiln.toml
    #[arg(long, global = true)]
    config: Option<String>,

    /// Ignore config files
    #[arg(long, global = true)]
    norc: bool,

    /// Print debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Show error backtraces (requires `RUST_BACKTRACE=1`)
    #[arg(long, global = true)]
    backtrace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold ext/<name>/extconf.rb and ext/<name>/<name>.c
    New {
        /// Extension name
        name: String,

        /// Also register these platforms for cross-compilation
        #[arg(long = "cross", value_delimiter = ',')]
        cross: Vec<String>,
    },

    /// Compile an extension for one or more platforms
    #[command(visible_alias = "build")]
    Compile {
        /// Extension name (directory under ext/)
        name: String,

        /// `native`, `cross`, or a configured platform name
        #[arg(long, short, default_value = "native")]
        platform: String,

        /// Rebuild even if sources are unchanged
        #[arg(long)]
        force: bool,

        /// Number of platforms to compile concurrently
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// Show toolchain output
        #[arg(long)]
        verbose: bool,

        /// Suppress all output except errors
        #[arg(long, short, conflicts_with = "verbose")]
        quiet: bool,
    },

    /// Report which platforms need recompiling
    Stale {
        /// Extension name (directory under ext/)
        name: String,

        /// `native`, `cross`, or a configured platform name
        #[arg(long, short, default_value = "native")]
        platform: String,
    },

    /// List the platforms a request resolves to
    Platforms {
        /// `native`, `cross`, or a configured platform name
        #[arg(long, short, default_value = "cross")]
        platform: String,
    },

    /// Check whether a compiled extension exists in a folder
    Verify {
        /// Extension name
        name: String,

        /// Folder expected to hold the binary, e.g. lib/x86-mingw32
        folder: String,

        /// Succeed only if the binary does NOT exist
        #[arg(long)]
        absent: bool,
    },

    /// Remove build directories and fingerprints
    Clean {
        /// Only clean this extension
        name: Option<String>,

        /// Also remove compiled binaries from lib/
        #[arg(long)]
        clobber: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    kiln::init_debug(cli.debug);

    let result = match cli.command {
        Commands::Completion { shell } => commands::completion::run(shell),
        command => commands::Project::load(&cli.directory, cli.config.as_deref(), cli.norc)
            .and_then(|project| match command {
                Commands::New { name, cross } => commands::new::run(&project, &name, &cross),
                Commands::Compile {
                    name,
                    platform,
                    force,
                    jobs,
                    verbose,
                    quiet,
                } => {
                    let options = commands::compile::CompileOptions {
                        force,
                        jobs,
                        verbose,
                        quiet,
                    };
                    commands::compile::run(&project, &name, &platform, options)
                }
                Commands::Stale { name, platform } => {
                    commands::stale::run(&project, &name, &platform)
                }
                Commands::Platforms { platform } => commands::platforms::run(&project, &platform),
                Commands::Verify {
                    name,
                    folder,
                    absent,
                } => commands::verify::run(&project, &name, &folder, absent),
                Commands::Clean { name, clobber } => {
                    commands::clean::run(&project, name.as_deref(), clobber)
                }
                Commands::Completion { shell } => commands::completion::run(shell),
            }),
    };

    if let Err(e) = result {
        display_error(&e, cli.backtrace);
        process::exit(1);
    }
}

mod commands;
