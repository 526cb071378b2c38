//! CLI argument definitions using clap derive

use crate::config::{BackendKind, ProgressMode};
use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Kiln - Dockerfile generator and image builder for model servers
///
/// Reads `kiln.toml`, renders a deterministic Dockerfile and builds it
/// with docker buildx, Google Cloud Build or Depot.
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "KILN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project directory (defaults to searching upwards from the current directory)
    #[arg(short = 'C', long, global = true)]
    pub dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate the Dockerfile and build the image
    Build(BuildArgs),

    /// Print the generated Dockerfile
    Generate(GenerateArgs),

    /// Create a kiln.toml template
    Init(InitArgs),

    /// Show or edit global settings
    Config(ConfigArgs),

    /// Check which build tools are available
    Status,

    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Arguments for the build command
#[derive(Parser, Debug, Default)]
pub struct BuildArgs {
    /// Image reference (defaults to [image].name in kiln.toml)
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Additional image reference (repeatable)
    #[arg(long = "tag-extra")]
    pub tag_extra: Vec<String>,

    /// Build backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Target platform (e.g. linux/amd64)
    #[arg(long)]
    pub platform: Option<String>,

    /// Image reference used as cache source (repeatable)
    #[arg(long)]
    pub cache_from: Vec<String>,

    /// Registry reference used as cache target (buildx only)
    #[arg(long)]
    pub cache_to: Option<String>,

    /// Push the image after building
    #[arg(long)]
    pub push: bool,

    /// Build tool progress output
    #[arg(long, value_enum)]
    pub progress: Option<ProgressMode>,

    /// Build a Dockerfile written earlier by `kiln generate -o` instead of generating one
    #[arg(long, value_name = "FILE")]
    pub dockerfile: Option<PathBuf>,
}

/// Arguments for the generate command
#[derive(Parser, Debug, Default)]
pub struct GenerateArgs {
    /// Write the Dockerfile to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print only the Dockerfile's sha256 fingerprint
    #[arg(long)]
    pub fingerprint: bool,
}

/// Arguments for the init command
#[derive(Parser, Debug, Default)]
pub struct InitArgs {
    /// Overwrite existing kiln.toml
    #[arg(short, long)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,

    /// Start from a GPU template
    #[arg(long)]
    pub gpu: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., builder.backend)
        key: String,
        /// Value to set
        value: String,
    },
}
