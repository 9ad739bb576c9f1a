pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "paygate",
    about = "Paygate operator CLI",
    long_about = "Inspect paygate configuration and check bot readiness before starting the server.",
    after_help = "Examples:\n  paygate config\n  paygate doctor --json\n  paygate doctor --offline"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token and administrator readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
        #[arg(long, help = "Skip the Telegram API call")]
        offline: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Doctor { json, offline } => commands::doctor::run(json, offline),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
