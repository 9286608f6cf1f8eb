use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "sema")]
#[command(version = BUILD_VERSION)]
#[command(about = "SEMA Node - Anonymous signaling with zero-knowledge group membership")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(short, long, global = true, value_name = "FILE", help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[arg(short = 'd', long, global = true, value_name = "DIR", env = "SEMA_DATA_DIR", help = "Data directory path")]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text", help = "Output format")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Initialize a data directory")]
    #[command(long_about = "Create the data directory and write a default configuration.\n\nCircuit keys are generated separately with sema-keygen.")]
    Init {
        #[arg(short, long, help = "Overwrite existing configuration")]
        force: bool,
    },

    #[command(about = "Manage local identities")]
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },

    #[command(about = "Validate configuration and circuit artifacts")]
    Check,

    #[command(about = "Run an in-process registration, proof and broadcast round")]
    #[command(long_about = "Register fresh identities, prove a signal for one of them and push it through the verification gate twice.\n\nThe second broadcast must be rejected as a reused nullifier.")]
    Simulate {
        #[arg(short, long, default_value_t = 5, help = "Number of identities to register")]
        members: u64,
        #[arg(short = 'i', long, help = "Leaf index of the signaling identity (default: last)")]
        prove_index: Option<u64>,
        #[arg(short, long, default_value = "yes", help = "Signal to broadcast")]
        signal: String,
        #[arg(long, default_value = "voting-1", help = "Signaling context label")]
        context: String,
    },

    #[command(about = "Show version information")]
    Version,
}

#[derive(Subcommand)]
pub enum IdentityAction {
    #[command(about = "Generate a new identity")]
    Generate {
        #[arg(short, long, help = "Human-readable label")]
        label: Option<String>,
    },

    #[command(about = "List stored identities")]
    List,

    #[command(about = "Show an identity's public data")]
    Show {
        #[arg(help = "Identity ID or label")]
        id: String,
    },
}
