//! Completions command - print shell completion scripts

use crate::cli::args::Cli;
use crate::error::KilnResult;
use clap::CommandFactory;
use clap_complete::{generate, Shell};

/// Execute the completions command
pub fn execute(shell: Shell) -> KilnResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}
