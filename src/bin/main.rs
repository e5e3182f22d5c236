//! dynrpc binary.
//!
//! Serves gRPC services described by sample payloads, calls them, and prints
//! the schemas inferred for them.

use clap::Parser;
use dynrpc_core::cli::{
    commands::Commands,
    handlers::{print_schema, run_call, run_server},
};
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logging = cli.command.logging();
    let level = logging.get_effective_level();

    // Logs go to stderr so `call` and `schema` output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.parse().unwrap_or(LevelFilter::INFO).into())
                .parse_lossy(logging.get_filter()),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    debug!("dynrpc starting up");

    match cli.command {
        Commands::Serve(cmd) => run_server(cmd).await?,
        Commands::Call(cmd) => run_call(cmd).await?,
        Commands::Schema(cmd) => print_schema(cmd)?,
    }

    Ok(())
}
