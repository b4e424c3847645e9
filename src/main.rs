mod cli;
mod commands;
mod config;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
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
        Err(err) => report_error(&ctx, &err),
    }
}

fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Apply(args) => commands::apply::run(ctx, &args),
        Command::List(args) => commands::list::run(ctx, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "clc-lb", &mut io::stdout());
            Ok(())
        }
    }
}

/// Print the error chain with advice for library errors, and pick the exit code.
fn report_error(ctx: &Context, err: &anyhow::Error) -> ExitCode {
    ui::error(&format!("{err:#}"));

    let Some(category) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<lbkit::Error>())
        .map(lbkit::Error::category)
    else {
        return ExitCode::FAILURE;
    };

    if !ctx.quiet {
        ui::dim_err(category.description());
        ui::dim_err(category.advice());
    }
    if ctx.verbose > 0 {
        log::debug!("{err:?}");
    }

    u8::try_from(category.exit_code()).map_or(ExitCode::FAILURE, ExitCode::from)
}
