//! `bitsearch-store` binary entry point.

use std::io::IsTerminal;
use std::net::SocketAddr;

use bitsearch_store::{run_with_shutdown, SpaceSpec, StoreConfig};
use clap::{Parser, Subcommand};

/// CLI entry point wrapper.
#[derive(Parser, Debug)]
#[command(name = "bitsearch-store", version)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single store node.
    Node(NodeArgs),
}

#[derive(Parser, Debug, Clone)]
struct NodeArgs {
    /// RESP listen address.
    #[arg(long, env = "BITSEARCH_STORE_LISTEN", default_value = "127.0.0.1:16379")]
    listen: SocketAddr,

    /// Spaces to declare at startup, as `name:dimensions`. Repeatable or comma-separated.
    #[arg(
        long = "space",
        env = "BITSEARCH_STORE_SPACES",
        value_delimiter = ',',
        required = true
    )]
    spaces: Vec<SpaceSpec>,

    /// Delay before an accepted write becomes searchable.
    #[arg(long, env = "BITSEARCH_STORE_PROPAGATION_DELAY", default_value = "0s")]
    propagation_delay: humantime::Duration,
}

#[tokio::main]
/// Parse CLI args, initialize logging, and run the requested subcommand.
async fn main() -> anyhow::Result<()> {
    // Enable ANSI colors only when stdout is a terminal and NO_COLOR is unset.
    let ansi = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    match args.cmd {
        Command::Node(args) => {
            let config = StoreConfig {
                listen: args.listen,
                spaces: args.spaces,
                propagation_delay: args.propagation_delay.into(),
            };
            run_with_shutdown(config, tokio::signal::ctrl_c()).await
        }
    }
}
