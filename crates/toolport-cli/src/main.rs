//! toolport CLI - run one adapter as an MCP server over stdio.

use clap::{Parser, Subcommand};
use toolport_cli::{build_server, Adapter};
use toolport_core::EnvSource;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolport")]
#[command(author, version, about = "toolport - MCP adapters for everyday services", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve an adapter on stdin/stdout
    Serve {
        /// Adapter to expose
        #[arg(value_enum)]
        adapter: Adapter,
    },

    /// List the tools an adapter provides
    Tools {
        /// Adapter to inspect
        #[arg(value_enum)]
        adapter: Adapter,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries protocol frames only
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let env = EnvSource::from_process();

    match cli.command {
        Commands::Serve { adapter } => {
            let mut server = build_server(adapter, &env).await?;
            server.run().await?;
        }
        Commands::Tools { adapter } => {
            let server = build_server(adapter, &env).await?;
            for tool in server.registry().definitions() {
                println!("{:<28} {}", tool.name, tool.description);
            }
        }
    }

    Ok(())
}
