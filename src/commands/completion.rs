//! Completion command
//!
//! Generate shell completion scripts

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::{self, Write};

/// Print the completion script for `shell` to stdout
///
/// ```bash
/// kiln completion bash > /usr/local/share/bash-completion/completions/kiln
/// kiln completion zsh > /usr/local/share/zsh/site-functions/_kiln
/// kiln completion fish > ~/.config/fish/completions/kiln.fish
/// ```
#[allow(
    clippy::unnecessary_wraps,
    reason = "Result type maintained for consistency with command signature pattern"
)]
pub(crate) fn run(shell: Shell) -> Result<()> {
    write_script(shell, &mut io::stdout());
    Ok(())
}

fn write_script(shell: Shell, out: &mut dyn Write) {
    let mut cmd = crate::Cli::command();
    generate(shell, &mut cmd, "kiln", out);
}
