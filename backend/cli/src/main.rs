mod serve_cmd;
mod status_cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "homh")]
#[command(about = "HOMH — persona companion chat gateway")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Socket address to bind, e.g. 127.0.0.1:8000
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Query a running gateway's health endpoint
    Status {
        /// Address of the gateway; defaults to HOMH_BIND or 127.0.0.1:8000
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind } => serve_cmd::run(bind).await,
        Commands::Status { bind } => status_cmd::run(bind).await,
    }
}
