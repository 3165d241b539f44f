use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;
use directories::ProjectDirs;
use std::path::PathBuf;

use crate::init_config::CmdConfig;

mod cmd;
mod helpers;
mod init_config;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// config file to use instead of the default one
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<InfoLevel>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Modify the Cairn config
    Config {
        #[command(subcommand)]
        cmd: CmdConfig,
    },
    /// Store and inspect DAG nodes in the local repository
    Object {
        #[command(subcommand)]
        cmd: ObjectCmd,
    },
    /// Manage pins in the local repository
    Pin {
        #[command(subcommand)]
        cmd: PinCmd,
    },
}

#[derive(Subcommand)]
enum ObjectCmd {
    /// Store a node and print its identifier
    Put {
        /// Node payload, stored as UTF-8
        #[arg(long, default_value = "")]
        data: String,
        /// Link to an existing node, as NAME=CID (repeatable)
        #[arg(short, long = "link", value_name = "NAME=CID")]
        links: Vec<String>,
    },
    /// Print a node's payload and links
    Get { cid: String },
}

#[derive(Subcommand)]
enum PinCmd {
    /// Pin nodes, recursively unless --direct is given
    Add {
        /// Identifiers or /ipfs/<cid>/<link name>/... paths
        #[arg(required = true, value_name = "PATH")]
        cids: Vec<String>,
        /// Pin only the nodes themselves, not what they link to
        #[arg(long, action = ArgAction::SetTrue)]
        direct: bool,
    },
    /// Remove pins
    Rm {
        /// Identifiers or /ipfs/<cid>/<link name>/... paths
        #[arg(required = true, value_name = "PATH")]
        cids: Vec<String>,
        /// Only remove direct pins; recursive ones are rejected
        #[arg(long, action = ArgAction::SetTrue)]
        direct: bool,
    },
    /// List pins, or explain why the given nodes are pinned
    Ls {
        #[arg(value_name = "PATH")]
        cids: Vec<String>,
        /// One of all, direct, recursive, indirect, internal
        #[arg(short = 't', long = "type", value_name = "TYPE", default_value = "all")]
        pin_type: String,
    },
    /// Rewrite the persisted pin state
    Flush,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .with_writer(std::io::stderr)
        .init();

    // - Config under: ~/.config/cairn/config.toml
    // - Data under:   ~/.local/share/cairn/
    let dirs =
        ProjectDirs::from("", "", "cairn").context("failed to determine config directory path")?;

    let config_file = cli
        .config
        .unwrap_or_else(|| dirs.config_dir().join("config.toml"));

    cmd::run_command(config_file, dirs.data_dir(), cli.cmd).await
}
