//! Server configuration, from command-line flags or environment variables.

use crate::storage::ExpiryConfig;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;

/// Radish - an in-memory key-value server with key expiration
#[derive(Parser, Debug, Clone)]
#[command(name = "radish", version)]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "RADISH_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "RADISH_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum number of expired-key deletions running at once
    #[arg(long, env = "RADISH_MAX_INFLIGHT_EXPIRATIONS", default_value_t = 64)]
    pub max_inflight_expirations: usize,

    /// Log filter, e.g. `info` or `radish=debug`
    #[arg(long, env = "RADISH_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn expiry_config(&self) -> ExpiryConfig {
        ExpiryConfig {
            max_inflight_callbacks: self.max_inflight_expirations,
        }
    }
}
