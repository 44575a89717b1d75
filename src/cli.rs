//! Command-line interface parsing for countrylookup
//!
//! This module handles parsing of CLI arguments using clap and turns them
//! into a `LookupConfig`.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::config::{LookupConfig, StalePolicy, DEFAULT_SERVICE_NAME};

/// Error types for CLI argument validation
#[derive(Debug, Error)]
pub enum CliError {
    /// The feed URL is not an http(s) URL
    #[error("Invalid feed URL: '{0}'. Expected an http:// or https:// URL")]
    InvalidUrl(String),

    /// A duration flag was zero
    #[error("--{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Look up the branch and legal entity of country codes
#[derive(Parser, Debug)]
#[command(name = "countrylookup")]
#[command(about = "Country code to branch and legal entity lookup")]
#[command(version)]
pub struct Cli {
    /// URL of the JSON lookup feed
    #[arg(long)]
    pub url: String,

    /// PEM file with the client certificate and private key
    #[arg(long, value_name = "PEM")]
    pub client_cert: Option<PathBuf>,

    /// Seconds a refreshed table stays fresh
    #[arg(long, value_name = "SECS", default_value_t = 900)]
    pub ttl: u64,

    /// Directory for the table snapshot (defaults to the system temp dir)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Service name used in the snapshot file name
    #[arg(long, value_name = "NAME", default_value = DEFAULT_SERVICE_NAME)]
    pub service_name: String,

    /// Seconds before a feed request is abandoned
    #[arg(long, value_name = "SECS", default_value_t = 10)]
    pub timeout: u64,

    /// Fail lookups instead of serving a stale table when a refresh fails
    #[arg(long)]
    pub strict: bool,

    /// Country codes to look up
    #[arg(value_name = "CODE", required = true)]
    pub codes: Vec<String>,
}

impl Cli {
    /// Builds the lookup configuration for a one-shot run
    ///
    /// Background refresh is disabled; the binary exits after answering.
    pub fn to_config(&self) -> Result<LookupConfig, CliError> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(CliError::InvalidUrl(self.url.clone()));
        }
        if self.ttl == 0 {
            return Err(CliError::ZeroDuration("ttl"));
        }
        if self.timeout == 0 {
            return Err(CliError::ZeroDuration("timeout"));
        }

        let mut config = LookupConfig::new(&self.url)
            .with_ttl(Duration::from_secs(self.ttl))
            .with_service_name(&self.service_name)
            .with_refresh_timeout(Duration::from_secs(self.timeout))
            .with_background_refresh(false);

        if let Some(ref cert) = self.client_cert {
            config = config.with_client_cert(cert);
        }
        if let Some(ref dir) = self.cache_dir {
            config = config.with_cache_dir(dir);
        }
        if self.strict {
            config = config.with_stale_policy(StalePolicy::FailOnError);
        }

        Ok(config)
    }
}
