use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::{Cli, CompletionShell};
use crate::error::CliError;

const BIN_NAME: &str = "fivwall";

impl From<CompletionShell> for Shell {
    fn from(shell: CompletionShell) -> Self {
        match shell {
            CompletionShell::Bash => Self::Bash,
            CompletionShell::Zsh => Self::Zsh,
            CompletionShell::Fish => Self::Fish,
        }
    }
}

/// Print the completion script, or write it to `output_path` and print the path.
pub fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    match output_path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_completions(shell, &mut writer);
            writer.flush()?;
            println!("{}", path.display());
        }
        None => write_completions(shell, &mut io::stdout().lock()),
    }
    Ok(())
}

pub fn write_completions(shell: CompletionShell, out: &mut dyn Write) {
    clap_complete::generate(Shell::from(shell), &mut Cli::command(), BIN_NAME, out);
}

pub fn render_completions(shell: CompletionShell) -> Vec<u8> {
    let mut buffer = Vec::new();
    write_completions(shell, &mut buffer);
    buffer
}
