//! Feed parsing and content fingerprints
//!
//! The remote feed is a JSON array of row objects, or an object that wraps
//! the array under a `lookup` key. Rows are normalized to canonical field
//! names before hashing, so the fingerprint only changes when the content
//! does.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::Row;

/// Errors that can occur when parsing a feed body
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// Body is not valid JSON or does not have the expected shape
    #[error("Failed to parse lookup feed: {0}")]
    InvalidFeed(String),
}

/// Accepted top-level shapes of the feed
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeedBody {
    Rows(Vec<Row>),
    Wrapped { lookup: Vec<Row> },
}

/// Parses a raw feed body into rows, preserving fetch order
pub fn parse_rows(bytes: &[u8]) -> Result<Vec<Row>, ParseError> {
    let body: FeedBody =
        serde_json::from_slice(bytes).map_err(|e| ParseError::InvalidFeed(e.to_string()))?;

    Ok(match body {
        FeedBody::Rows(rows) => rows,
        FeedBody::Wrapped { lookup } => lookup,
    })
}

/// SHA-256 content hash of a canonical row set, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of rows in fetch order
    pub fn of_rows(rows: &[Row]) -> Self {
        let mut hasher = Sha256::new();
        // Vec<Row> has no map keys and no floats, so serialization cannot fail.
        if let Ok(canonical) = serde_json::to_vec(rows) {
            hasher.update(&canonical);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
