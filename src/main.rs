// ABOUTME: Entry point for the stowage CLI application.
// ABOUTME: Parses arguments, loads configuration once, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, ContainersCommand, ImagesCommand, StorageCommand};
use std::sync::Arc;
use stowage::config::Config;
use stowage::error::Result;
use stowage::images::DeleteOptions;
use stowage::output::Output;
use stowage::process::{CommandRunner, HostRunner};
use stowage::syscontainer::ExecRequest;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise the verbose flag picks the level
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if cli.verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new("warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let output = Output::new(cli.output_mode());
    let code = match run(cli, &output).await {
        Ok(code) => code,
        Err(e) => {
            output.error(&e.to_string());
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, output: &Output) -> Result<i32> {
    let config = Config::load(cli.config.as_deref())?;
    let runner: Arc<dyn CommandRunner> = Arc::new(HostRunner);

    match cli.command {
        Commands::Images { command } => match command {
            ImagesCommand::Delete(args) => {
                let opts = DeleteOptions {
                    targets: args.targets,
                    all: args.all,
                    storage: args.storage,
                    force: args.force,
                    assume_yes: args.assumeyes,
                    remote: args.remote,
                };
                commands::delete(&config, runner, output, opts).await
            }
            ImagesCommand::Prune => commands::prune(&config, runner, output).await,
        },
        Commands::Containers { command } => match command {
            ContainersCommand::Exec { name, detach, args } => {
                let request = ExecRequest { name, detach, args };
                commands::exec(&config, runner, output, request).await
            }
            ContainersCommand::CheckRemote { path } => commands::check_remote(&path, output),
        },
        Commands::Storage { command } => match command {
            StorageCommand::List => commands::list_storage(&config, runner, output).await,
        },
    }
}
