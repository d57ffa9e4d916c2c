use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "identd",
    version,
    about = "RFC 1413 ident server for IRC clients"
)]
pub struct Cli {
    /// Path to configuration file (also settable via IDENTD_CONFIG env var)
    #[arg(short, long, default_value = "identd.toml", env = "IDENTD_CONFIG")]
    pub config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the ident server in the foreground (default)
    Run,
    /// Validate configuration file
    CheckConfig,
    /// Show the effective configuration
    ShowConfig {
        /// Output format: toml or json
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Print one setting by its preference key (e.g. advanced.port)
    Get {
        /// Setting key
        key: String,
    },
    /// Print the reply the server would send for a request line
    Respond {
        /// Request line, e.g. "6667, 54321"
        line: String,
    },
    /// Send an ident query to a server and print the reply
    Query {
        /// Ident server address (host:port)
        #[arg(long, default_value = "127.0.0.1:113")]
        addr: String,
        /// Port on the queried host
        #[arg(long)]
        local: u16,
        /// Port on this host
        #[arg(long)]
        remote: u16,
        /// Timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
}
