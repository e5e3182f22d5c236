pub mod call;
pub mod config;
pub mod schema;
pub mod serve;

pub use call::CallCommand;
pub use config::LoggingConfig;
pub use schema::SchemaCommand;
pub use serve::ServeCommand;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Serve every call of a manifest
    Serve(ServeCommand),
    /// Call one method of a running service
    Call(CallCommand),
    /// Print the schema inferred from a manifest
    Schema(SchemaCommand),
}

impl Commands {
    pub fn logging(&self) -> LoggingConfig {
        match self {
            Commands::Serve(cmd) => cmd.effective_logging(),
            Commands::Call(cmd) => cmd.logging.clone(),
            Commands::Schema(cmd) => cmd.logging.clone(),
        }
    }
}
