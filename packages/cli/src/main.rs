mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{check, options, payload, submit, CheckArgs, OptionsArgs, PayloadArgs, SubmitArgs};
use tracing_subscriber::EnvFilter;

/// Formset CLI - check, preview and submit declarative formsets
#[derive(Parser, Debug)]
#[command(name = "formset")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report broken conditions and action chains in schemas
    Check(CheckArgs),

    /// Print the submission payload a formset would send
    Payload(PayloadArgs),

    /// Submit a formset to the configured endpoint
    Submit(SubmitArgs),

    /// Look up selectable options for a field
    Options(OptionsArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = std::env::current_dir()
        .map_err(anyhow::Error::from)
        .and_then(|cwd| match cli.command {
            Command::Check(args) => check(args),
            Command::Payload(args) => payload(args),
            Command::Submit(args) => submit(args, &cwd),
            Command::Options(args) => options(args, &cwd),
        });

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
