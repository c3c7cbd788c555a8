use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "emodel",
    about = "Estimate per-cluster CPU energy from an energy model and idle/frequency residency",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output as JSON instead of formatted tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase report detail (-v: breakdown table, -vv: skipped states)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Read configuration from this file only
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compute the energy breakdown for a trace snapshot.
    /// Writes a blank template instead if the model file does not exist.
    Report {
        /// Trace snapshot (JSON) with topology and residency statistics
        #[arg(short, long)]
        trace: PathBuf,

        /// Energy model file (default from config)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Parse an energy model file and summarize it
    Check {
        /// Energy model file (default from config)
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Write a blank energy model template shaped after a trace snapshot
    Template {
        /// Trace snapshot (JSON) with topology and residency statistics
        #[arg(short, long)]
        trace: PathBuf,

        /// Destination file (default from config)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (auto-detected if omitted)
        shell: Option<Shell>,
    },
}

/// Print shell completions to stdout.
pub fn print_completions(shell: Option<Shell>) {
    let shell = shell.or_else(Shell::from_env).unwrap_or_else(|| {
        eprintln!(
            "Could not detect shell. Specify one: emodel completions bash|zsh|fish|elvish|powershell"
        );
        std::process::exit(1);
    });
    clap_complete::generate(shell, &mut Cli::command(), "emodel", &mut std::io::stdout());
}
