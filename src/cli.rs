// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use stowage::output::OutputMode;

#[derive(Parser)]
#[command(name = "stowage")]
#[command(about = "Manage images and system containers across Docker and OSTree storage")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: /etc/stowage/stowage.yml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage images
    Images {
        #[command(subcommand)]
        command: ImagesCommand,
    },

    /// Work with system containers
    Containers {
        #[command(subcommand)]
        command: ContainersCommand,
    },

    /// Inspect storage backends
    Storage {
        #[command(subcommand)]
        command: StorageCommand,
    },
}

#[derive(Subcommand)]
pub enum ImagesCommand {
    /// Delete images from local storage or a remote registry
    Delete(DeleteArgs),

    /// Remove dangling images from every backend
    Prune,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Images to delete
    #[arg(value_name = "IMAGE")]
    pub targets: Vec<String>,

    /// Delete all images
    #[arg(short, long)]
    pub all: bool,

    /// Only use this storage backend (docker, ostree)
    #[arg(long, value_name = "NAME")]
    pub storage: Option<String>,

    /// Delete images even if containers use them
    #[arg(short, long)]
    pub force: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub assumeyes: bool,

    /// Mark the images for deletion on their registry
    #[arg(long)]
    pub remote: bool,
}

#[derive(Subcommand)]
pub enum ContainersCommand {
    /// Run a command in a system container
    Exec {
        /// Name of the system container
        name: String,

        /// Detach from the container
        #[arg(short, long)]
        detach: bool,

        /// Command and arguments to run
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Print the container location for a remote rootfs path
    CheckRemote {
        /// Container directory or its rootfs
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum StorageCommand {
    /// Show the storage backends and whether they are active
    List,
}
