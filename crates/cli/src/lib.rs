pub mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "quill",
    about = "Operator CLI for the Quill lead-routing service",
    after_help = "Examples:\n  quill migrate\n  quill seed\n  quill doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run startup preflight checks (config, database, schema, rotation pool)
    Start,
    /// Apply pending database migrations
    Migrate,
    /// Load the deterministic demo roster and sample leads
    Seed,
    /// Run end-to-end readiness checks with per-check timing
    Smoke,
    /// Show effective configuration with source attribution and redaction
    Config,
    /// Validate config, database connectivity, and rotation-pool readiness
    Doctor {
        /// Emit machine-readable JSON output
        #[arg(long)]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Smoke => commands::smoke::run(),
        Command::Config => CommandResult { exit_code: 0, output: commands::config::run() },
        Command::Doctor { json } => {
            CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
