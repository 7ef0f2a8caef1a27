use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "custom-modes")]
#[command(about = "Inspect and edit custom agent modes across project and global sources")]
#[command(version)]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Project root (default: current directory)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Ignore project sources entirely
    #[arg(long, global = true, conflicts_with = "project")]
    pub no_project: bool,

    /// Global storage root (default: $CUSTOM_MODES_HOME or the platform data dir)
    #[arg(long, global = true)]
    pub global_storage: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Scope {
    Project,
    Global,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List resolved modes
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one resolved mode
    Show {
        /// Mode slug
        slug: String,
    },

    /// Create or replace a mode from a YAML file
    Set {
        /// YAML file holding one mode record
        file: PathBuf,

        /// Override the slug in the file
        #[arg(long)]
        slug: Option<String>,

        /// Target scope (default: the record's `source`, else global)
        #[arg(long, value_enum)]
        scope: Option<Scope>,

        /// Write a per-mode file in the modes directory
        #[arg(long, conflicts_with = "to_file")]
        to_directory: bool,

        /// Write into the scope's monolithic modes file
        #[arg(long)]
        to_file: bool,
    },

    /// Delete a mode from every source
    Delete {
        /// Mode slug
        slug: String,
    },

    /// Export a mode and its rule files as a bundle
    Export {
        /// Mode slug
        slug: String,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a bundle of modes and rule files
    Import {
        /// Bundle file
        file: PathBuf,

        /// Target scope
        #[arg(long, value_enum, default_value = "project")]
        scope: Scope,

        /// Write per-mode files instead of the monolithic file
        #[arg(long)]
        to_directory: bool,
    },

    /// Manage engine configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., scan.exclude)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., scan.exclude)
        key: String,

        /// Value to set (e.g., ".git,node_modules" or "[.git, node_modules]")
        value: String,
    },

    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init,
}
