//! Command-line interface module.
//!
//! This module provides the CLI functionality for:
//! - Serving a manifest as a mock gRPC service
//! - Calling a running service from the command line
//! - Printing the schema inferred from a manifest

pub mod commands;
pub mod handlers;

pub use handlers::{print_schema, run_call, run_server};
