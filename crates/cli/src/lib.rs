pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "staffchat",
    about = "StaffChat operator CLI",
    long_about = "Ask StaffConnect questions, check runtime readiness, inspect config, and load demo data.",
    after_help = "Examples:\n  staffchat ask \"Who logged in yesterday?\"\n  staffchat doctor --json\n  staffchat seed"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Route one question to an agent and print the formatted answer")]
    Ask {
        question: String,
        #[arg(long, help = "Print the raw result envelope as JSON")]
        json: bool,
    },
    #[command(about = "Validate config, LLM settings, database schema, and chart/baseline paths")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Load the StaffConnect demo dataset into the configured database")]
    Seed,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Ask { question, json } => commands::ask::run(&question, json),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Seed => commands::seed::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
