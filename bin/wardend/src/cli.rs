use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wardend")]
#[command(about = "Polkadot node workload operator", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE", default_value = "/etc/nodewarden/config.toml")]
    pub config: PathBuf,

    /// Directory for durable stored state
    #[arg(short, long, value_name = "DIR", default_value = "/var/lib/nodewarden/state")]
    pub state_dir: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one reconciliation pass against the declared configuration
    Reconcile,
    /// Report the current unit status
    Status,
    /// Start the node service
    Start,
    /// Stop the node service
    Stop,
    /// Restart the node service
    Restart,
    /// Rotate session keys and print the new public key blob
    GetSessionKey,
    /// Check whether the node holds a session key blob
    HasSessionKey {
        key: String,
    },
    /// Insert a keystore key from a mnemonic and public address. Without
    /// --mnemonic the configured mnemonic-secret is used.
    InsertKey {
        #[arg(long)]
        mnemonic: Option<String>,
        #[arg(long)]
        address: String,
    },
    /// Replace the node identity key with the contents of a file
    SetNodeKey {
        #[arg(long)]
        key_file: PathBuf,
    },
    /// Print diagnostic information about the managed node
    NodeInfo,
    /// Migrate the chain database between the legacy and snap layouts
    MigrateData {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        reverse: bool,
    },
    /// Migrate the node identity key between the legacy and snap locations
    MigrateNodeKey {
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        reverse: bool,
    },
    /// Record a relay RPC endpoint advertised by a peer, then reconcile
    EndpointJoined {
        #[arg(long)]
        peer: String,
        #[arg(long)]
        relation_id: u32,
        #[arg(long)]
        url: String,
    },
    /// Remove a departed peer's relay RPC endpoint, then reconcile
    EndpointDeparted {
        #[arg(long)]
        peer: String,
        #[arg(long)]
        relation_id: u32,
    },
}
