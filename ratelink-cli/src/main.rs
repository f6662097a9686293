//! Ratelink command-line interface

mod cli;
mod commands;
mod config;
mod context;
mod logging;
mod output;

use clap::Parser;
use std::process::ExitCode;

use crate::cli::{Cli, Commands};
use crate::config::CliConfig;
use crate::context::Context;
use crate::logging::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    let log_format = cli.log_format.unwrap_or(config.log_format);
    let filter = if cli.verbose {
        Some("ratelink=debug".to_string())
    } else {
        config.log_filter.clone()
    };
    if let Err(err) = init_logging(log_format, filter.as_deref()) {
        eprintln!("Error: {:#}", err);
        return ExitCode::FAILURE;
    }

    let ctx = match Context::new(&cli, config) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };
    ctx.watch_interrupt();

    match run(&ctx, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ctx.output.error(&format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

async fn run(ctx: &Context, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Vendors => commands::vendors::list(ctx),
        Commands::TestConnection(args) => commands::vendors::test_connection(ctx, args).await,
        Commands::Fetch(args) => commands::remote::fetch(ctx, args).await,
        Commands::Push(args) => commands::remote::push(ctx, args).await,
        Commands::Import(args) => commands::files::import(ctx, args),
        Commands::Validate(args) => commands::files::validate(ctx, args),
        Commands::Export(args) => commands::files::export(ctx, args),
        Commands::Template(args) => commands::files::template(ctx, args),
    }
}
