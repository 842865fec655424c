pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::requests::RequestsCommand;

#[derive(Debug, Parser)]
#[command(
    name = "steps",
    about = "stepsERP operator CLI",
    long_about = "Operate stepsERP preflight, migrations, seed data, config inspection and request decisions.",
    after_help = "Examples:\n  steps start\n  steps config\n  steps requests list --category material-request --status pending\n  steps requests approve --category material-request MR-seed-001 --vendor \"Acme Supplies\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic request scenarios and verify them")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(subcommand, about = "List, approve and reject requests")]
    Requests(RequestsCommand),
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Requests(command) => commands::requests::run(command),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
