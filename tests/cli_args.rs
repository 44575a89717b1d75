//! Integration tests for CLI argument handling
//!
//! Tests flag parsing, validation errors and exit codes of the binary.

use std::process::Command;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_countrylookup"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute countrylookup")
}

/// A loopback URL nobody listens on
fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/lookup_table.json", addr)
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("countrylookup"), "Help should mention countrylookup");
    assert!(stdout.contains("--url"), "Help should mention --url flag");
    assert!(stdout.contains("--client-cert"), "Help should mention --client-cert flag");
}

#[test]
fn test_missing_url_prints_error_and_exits() {
    let output = run_cli(&["US"]);
    assert!(!output.status.success(), "Expected missing --url to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--url"), "Should mention the missing flag: {}", stderr);
}

#[test]
fn test_invalid_url_exits_with_usage_code() {
    let output = run_cli(&["--url", "example.com/lookup.json", "US"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid feed URL"), "{}", stderr);
}

#[test]
fn test_unreachable_feed_without_snapshot_is_unavailable() {
    let dir = tempfile::TempDir::new().unwrap();
    let url = dead_url();
    let cache_dir = dir.path().to_str().unwrap();

    let output = run_cli(&["--url", &url, "--cache-dir", cache_dir, "--timeout", "2", "US"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("US: Lookup table unavailable"), "{}", stderr);
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use clap::Parser;
    use countrylookup::cli::{Cli, CliError};
    use countrylookup::StalePolicy;
    use std::time::Duration;

    #[test]
    fn test_cli_defaults_map_to_default_config() {
        let cli = Cli::parse_from(["countrylookup", "--url", "https://example.com/t.json", "US"]);
        let config = cli.to_config().unwrap();

        assert_eq!(config.ttl, Duration::from_secs(900));
        assert_eq!(config.refresh_timeout, Duration::from_secs(10));
        assert_eq!(config.stale_policy, StalePolicy::ServeStale);
        assert_eq!(config.cache_dir, std::env::temp_dir());
        assert!(config.client_cert.is_none());
    }

    #[test]
    fn test_cli_zero_timeout_is_rejected() {
        let cli = Cli::parse_from([
            "countrylookup",
            "--url",
            "https://example.com/t.json",
            "--timeout",
            "0",
            "US",
        ]);
        assert!(matches!(cli.to_config(), Err(CliError::ZeroDuration("timeout"))));
    }

    #[test]
    fn test_cli_multiple_codes() {
        let cli = Cli::parse_from([
            "countrylookup",
            "--url",
            "https://example.com/t.json",
            "US",
            "FR",
            "DE",
        ]);
        assert_eq!(cli.codes, vec!["US", "FR", "DE"]);
    }
}
