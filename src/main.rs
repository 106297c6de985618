mod cli;
mod commands;
mod config;
mod engine;
mod error;
mod generate;
mod paths;
mod resolver;
mod resource;
mod router;
mod ui;
mod validator;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use cli::{Cli, Command};
use resource::ResourceType;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match run(&ctx, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err, ctx.verbose);
            ExitCode::FAILURE
        }
    }
}

fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Detection(cmd) => commands::run(ctx, ResourceType::ScheduledDetection, cmd),
        Command::MsftDetection(cmd) => {
            commands::run(ctx, ResourceType::MicrosoftSecurityDetection, cmd)
        }
        Command::DataSource(cmd) => commands::run(ctx, ResourceType::DataSource, cmd),
        Command::Config => commands::config::show(ctx),
        Command::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "sentinel", &mut io::stdout());
            Ok(())
        }
    }
}

/// Print the error chain, plus advice for remote failures.
fn report(err: &anyhow::Error, verbose: u8) {
    if verbose > 1 {
        log::debug!("{err:?}");
    }
    ui::error(&err.to_string());
    for cause in err.chain().skip(1) {
        ui::dim(&format!("caused by: {cause}"));
    }
    if let Some(remote) = err.chain().find_map(|e| e.downcast_ref::<armkit::Error>()) {
        let category = remote.category();
        ui::dim(&format!("{}: {}", category.description(), category.advice()));
    }
}
