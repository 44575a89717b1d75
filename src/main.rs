//! countrylookup - Look up the branch and legal entity for country codes
//!
//! Builds a lookup cache from the configured feed (seeded from the local
//! snapshot when one exists), answers each code given on the command line,
//! and exits.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use countrylookup::cli::Cli;
use countrylookup::{LookupCache, LookupError};

/// Logs go to stderr so stdout stays machine readable
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();

    let cli = Cli::parse();
    let config = match cli.to_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };

    let cache = match LookupCache::new(&config) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut unavailable = false;
    for code in &cli.codes {
        match cache.get_branch_and_legal_entity(code).await {
            Ok(hit) => println!("{}\t{}\t{}", code, hit.branch, hit.legal_entity),
            Err(LookupError::NotFound(_)) => println!("{}\tnot found", code),
            Err(e @ LookupError::Unavailable) => {
                eprintln!("{}: {}", code, e);
                unavailable = true;
            }
        }
    }

    cache.shutdown().await;

    if unavailable {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
