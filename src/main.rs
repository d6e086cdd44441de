mod checker;
mod commands;
mod config;
mod output;
mod policy;
mod recover;
mod report;
mod sessions;
mod settings;

use anyhow::Result;
use checker::CheckError;
use clap::{Parser, Subcommand};
use commands::CheckOpts;
use config::Dirs;
use std::path::PathBuf;
use std::process;

/// sesslint: check AI coding sessions against your own rules.
#[derive(Parser, Debug)]
#[command(name = "sesslint", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Setup wizard: choose a persona, create a policy, install the hook.
    Init,

    /// Pick a session and check it against your policy.
    Check {
        /// Check the most recent session without prompting.
        #[arg(long)]
        last: bool,

        /// Minimal output (for hook usage).
        #[arg(long)]
        quiet: bool,

        /// Skip session insights.
        #[arg(long)]
        no_insights: bool,
    },

    /// Check multiple recent sessions and generate a markdown report.
    Report {
        /// Number of recent sessions to check.
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Export the markdown report to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Open your policy file in your default editor.
    Policy,

    /// Manage the SessionEnd hook.
    Hook {
        #[command(subcommand)]
        hook_command: HookCommand,
    },
}

#[derive(Subcommand, Debug)]
enum HookCommand {
    /// Install the SessionEnd hook in ~/.claude/settings.json.
    Install,
    /// Remove the SessionEnd hook.
    Uninstall,
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let dirs = Dirs::from_env()?;

    match cli.command {
        Command::Init => commands::init(&dirs),
        Command::Check {
            last,
            quiet,
            no_insights,
        } => commands::check(&dirs, &CheckOpts { last, quiet, no_insights }),
        Command::Report { count, output } => commands::report(&dirs, count, output),
        Command::Policy => commands::edit_policy(&dirs),
        Command::Hook { hook_command } => match hook_command {
            HookCommand::Install => commands::hook_install(&dirs),
            HookCommand::Uninstall => commands::hook_uninstall(&dirs),
        },
    }
}

fn main() {
    if let Err(err) = run() {
        // A missing CLI is a setup problem; say what to do about it
        // instead of printing a bare failure.
        if let Some(CheckError::CliNotFound { .. }) = err.downcast_ref::<CheckError>() {
            eprintln!("sesslint: {err}");
            eprintln!("sesslint: install the claude CLI, then re-run this command.");
        } else {
            eprintln!("sesslint: {err:#}");
        }
        process::exit(1);
    }
}
