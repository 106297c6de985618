use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(version)]
#[command(about = "Deploy Azure Sentinel detections and data sources from YAML", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage scheduled detections
    #[command(subcommand)]
    Detection(ResourceCommand),

    /// Manage Microsoft security detections
    #[command(subcommand, name = "msft-detection")]
    MsftDetection(ResourceCommand),

    /// Manage data sources and their parsers
    #[command(subcommand, name = "data-source")]
    DataSource(ResourceCommand),

    /// Show the settings file and effective workspace
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Shared flags
// ============================================================================

/// Target workspace; each flag overrides the settings file.
#[derive(Args, Debug, Clone, Default)]
pub struct WorkspaceFlags {
    /// Primary subscription id (defaults to the Azure CLI account)
    #[arg(long, env = "SENTINEL_SUBSCRIPTION")]
    pub subscription: Option<String>,

    /// Resource group of the Sentinel workspace
    #[arg(short = 'g', long, env = "SENTINEL_RESOURCE_GROUP")]
    pub resource_group: Option<String>,

    /// Log Analytics workspace name
    #[arg(short = 'w', long, env = "SENTINEL_WORKSPACE")]
    pub workspace_name: Option<String>,

    /// Comma-separated subscriptions that own linked playbooks
    #[arg(long)]
    pub aux_subscriptions: Option<String>,
}

/// Exactly one of `--directory` or `--file`.
#[derive(Args, Debug, Clone)]
pub struct TargetFlags {
    /// Deploy every YAML file under this directory
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Deploy a single YAML file
    #[arg(short, long)]
    pub file: Option<PathBuf>,
}

// ============================================================================
// Resource commands
// ============================================================================

#[derive(Subcommand)]
pub enum ResourceCommand {
    /// Create or update resources from YAML files
    #[command(visible_alias = "update")]
    Create(CreateArgs),

    /// Validate YAML files against the schema
    Validate(ValidateArgs),

    /// Scaffold a new resource file
    Generate(GenerateArgs),

    /// Show a deployed resource
    Show {
        /// Rule id, or parser function id for data sources
        id: String,

        #[command(flatten)]
        workspace: WorkspaceFlags,
    },

    /// Delete a deployed resource
    Delete {
        /// Rule id, or parser function id for data sources
        id: String,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        workspace: WorkspaceFlags,
    },

    /// List deployed resources
    List {
        #[command(flatten)]
        workspace: WorkspaceFlags,
    },
}

#[derive(Args)]
pub struct CreateArgs {
    #[command(flatten)]
    pub target: TargetFlags,

    /// Validate every file before deploying any
    #[arg(long)]
    pub enable_validation: bool,

    /// Schema to validate against instead of the resolved one
    #[arg(long, requires = "enable_validation")]
    pub schema: Option<PathBuf>,

    /// Relink playbooks even if already linked
    #[arg(long)]
    pub force_link_playbook: bool,

    #[command(flatten)]
    pub workspace: WorkspaceFlags,
}

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub target: TargetFlags,

    /// Schema to validate against instead of the resolved one
    #[arg(long)]
    pub schema: Option<PathBuf>,
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Directory to write into
    #[arg(short, long, default_value = ".")]
    pub directory: PathBuf,

    /// Resource name (letters, digits and dashes)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Put the files in a new subdirectory named after the resource
    #[arg(long)]
    pub create_subdirectory: bool,

    /// Also write a Markdown documentation file
    #[arg(long)]
    pub with_documentation: bool,

    /// Never prompt; requires --name
    #[arg(long, requires = "name")]
    pub skip_interactive: bool,
}
