//! pidffctl - PID force feedback inspection CLI
//!
//! Loads a report descriptor tree and shows the field map built from it,
//! the reports an effect encodes to, and what a raw report decodes to.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{DecodeArgs, EncodeArgs, FieldsArgs};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "pidffctl")]
#[command(about = "PID force feedback CLI - inspect descriptors, encode effects, decode reports")]
#[command(version)]
#[command(long_about = "
pidffctl works on report descriptor trees stored as JSON or YAML.
It lists the PID fields a descriptor declares, runs an effect through the
translation layer against a recording transport, and decodes raw reports.

Use --json flag for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output format (human-readable or JSON)
    #[arg(
        long,
        global = true,
        help = "Output in JSON format for machine parsing"
    )]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List reports, fields and capabilities of a descriptor
    Fields(FieldsArgs),

    /// Encode an effect into the reports the device receives
    Encode(EncodeArgs),

    /// Decode a raw report against a descriptor
    Decode(DecodeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pidffctl={log_level},openracing_pidff_common={log_level}").into()
            }),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => Ok(()),
        Err(e) => {
            let exit_code = e.exit_code();
            let e = anyhow::Error::new(e);
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }
            std::process::exit(exit_code);
        }
    }
}

fn execute_command(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Commands::Fields(args) => commands::fields::execute(args, cli.json),
        Commands::Encode(args) => commands::encode::execute(args, cli.json),
        Commands::Decode(args) => commands::decode::execute(args, cli.json),
    }
}
