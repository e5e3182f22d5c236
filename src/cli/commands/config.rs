use clap::Args;
use serde::Deserialize;

/// Logging configuration that can be set via CLI, env vars, or config file
#[derive(Debug, Clone, Default, Args, Deserialize)]
pub struct LoggingConfig {
    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    #[serde(skip)]
    pub verbose: u8,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", env = "DYNRPC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log filter directives
    #[arg(long = "log-filter", env = "DYNRPC_LOG_FILTER")]
    pub log_filter: Option<String>,
}

impl LoggingConfig {
    pub fn get_effective_level(&self) -> &str {
        match (self.verbose, self.log_level.as_deref()) {
            (v, _) if v >= 2 => "trace", // -vv flag
            (1, _) => "debug",           // -v flag
            (0, Some(level)) => level,   // Configured level
            _ => "info",                 // Default
        }
    }

    /// Uses `level` when neither `--log-level` nor the environment set one.
    pub fn or_level(mut self, level: &str) -> Self {
        if self.log_level.is_none() {
            self.log_level = Some(level.to_string());
        }
        self
    }

    /// Filter directives; defaults to the effective level for this crate.
    pub fn get_filter(&self) -> String {
        match &self.log_filter {
            Some(filter) => filter.clone(),
            None => {
                let level = self.get_effective_level();
                format!("dynrpc_core={level},dynrpc={level}")
            }
        }
    }
}
