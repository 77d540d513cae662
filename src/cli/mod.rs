//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Shared request list backed by a gist, with a local overflow queue
#[derive(Parser, Debug)]
#[command(name = "rql", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Token for remote writes (never stored)
    #[arg(long, global = true, env = "RQL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Gist holding the shared list
    #[arg(long, global = true)]
    pub gist_id: Option<String>,

    /// Local queue file (default: ~/.reqlist/queue.json)
    #[arg(long, global = true)]
    pub queue: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show shared and queued requests
    List,

    /// Add a request
    Add(AddArgs),

    /// Delete requests by their `list` index
    Delete(DeleteArgs),

    /// Publish a queued request to the shared list
    Promote {
        /// Index within the local queue (the `L` column of `list`)
        local_index: usize,
    },

    /// Configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Request text (1-200 characters)
    pub text: String,

    /// Keep the request in the local queue instead of publishing it
    #[arg(long, conflicts_with = "fallback_local")]
    pub local: bool,

    /// Queue the request locally if publishing fails
    #[arg(long)]
    pub fallback_local: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Flat indices as shown by the last `list`
    #[arg(required = true, num_args = 1..)]
    pub indices: Vec<usize>,

    /// Revision shown by `list`; refuse to delete if the shared list changed since
    #[arg(long)]
    pub rev: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Update settings in the config file (the gist id comes from --gist-id)
    Set(ConfigSetArgs),
}

#[derive(Args, Debug, Default)]
pub struct ConfigSetArgs {
    /// Gist owner (used to build the raw URL)
    #[arg(long)]
    pub owner: Option<String>,

    /// File within the gist
    #[arg(long)]
    pub file_name: Option<String>,

    /// Explicit raw read URL
    #[arg(long)]
    pub raw_url: Option<String>,

    /// GitHub API base URL
    #[arg(long)]
    pub api_base: Option<String>,

    /// Automatic retries after a conflicting add
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Local queue file
    #[arg(long)]
    pub queue_path: Option<PathBuf>,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
