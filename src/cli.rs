use clap::{Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "dbstand")]
#[command(version)]
#[command(about = "Multi-node database test environments from compact directives", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Container provider
    #[arg(short, long, global = true, default_value = "docker")]
    pub provider: String,

    /// Namespace for containers, networks and the inventory
    #[arg(short, long, global = true, default_value = "")]
    pub namespace: String,

    /// Default memory amount per node (docker --memory)
    #[arg(short, long, global = true)]
    pub memory: Option<String>,

    /// Default number of CPU cores per node (docker --cpus)
    #[arg(long, global = true)]
    pub cpus: Option<String>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy hosts from directives ("deploy help" lists examples)
    Deploy(DeployArgs),

    /// Delete containers and clusters for the current namespace
    Destroy,

    /// Manage namespaces
    #[command(subcommand)]
    Namespace(NamespaceCommand),

    /// Manage containers
    #[command(subcommand)]
    Container(ContainerCommand),

    /// Exec a command in a node's container
    Exec(ExecArgs),

    /// Re-run the ansible playbook over the existing inventory
    Playbook,

    /// Re-create the version rule database
    Update(UpdateArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Deploy
// ============================================================================

#[derive(Parser)]
pub struct DeployArgs {
    /// Do not remove existing containers and network first
    #[arg(long)]
    pub keep: bool,

    /// Deployment directives, e.g. mysql:8.0 node1 mysql:master=node0
    #[arg(trailing_var_arg = true)]
    pub directives: Vec<String>,
}

// ============================================================================
// Namespace Commands
// ============================================================================

#[derive(Subcommand)]
pub enum NamespaceCommand {
    /// Create a namespace with containers
    Create(NamespaceCreateArgs),

    /// List namespaces
    List,

    /// Delete a namespace
    Delete {
        /// Namespace name
        name: String,
    },
}

#[derive(Parser)]
pub struct NamespaceCreateArgs {
    /// Namespace name
    pub name: String,

    /// Operating system per container: node0=el8,node1=el9...
    #[arg(short, long, default_value = "")]
    pub os: String,

    /// Whether containers run privileged: node0=true,node1=false...
    #[arg(long, default_value = "")]
    pub privileged: String,

    /// Ports to expose per container: node0=8443...
    #[arg(long, default_value = "")]
    pub expose: String,
}

// ============================================================================
// Container Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ContainerCommand {
    /// List containers in the current namespace
    List,

    /// Create a single container
    Create(ContainerCreateArgs),
}

#[derive(Parser)]
pub struct ContainerCreateArgs {
    /// Container name
    pub name: String,

    /// Operating system of the container
    #[arg(short, long, default_value = "el8")]
    pub os: String,

    /// Expose port (docker -p)
    #[arg(short = 'e', long)]
    pub expose: Option<String>,

    /// Whether the container should be privileged
    #[arg(long, default_value_t = true)]
    pub privileged: bool,
}

// ============================================================================
// Exec
// ============================================================================

#[derive(Parser)]
pub struct ExecArgs {
    /// Node name followed by the command to run, e.g. node0 -- ps aux
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

// ============================================================================
// Update
// ============================================================================

#[derive(Parser)]
pub struct UpdateArgs {
    /// SQL dump to load instead of starting from an empty schema
    pub file: Option<String>,
}
