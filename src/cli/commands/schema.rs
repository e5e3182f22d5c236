use super::LoggingConfig;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct SchemaCommand {
    /// Manifest describing the service
    #[arg(short = 'm', long, value_name = "FILE")]
    pub manifest: PathBuf,

    #[command(flatten)]
    pub logging: LoggingConfig,
}
