//! Core data models for the country lookup table
//!
//! This module contains the row type carried by the remote feed and the
//! durable snapshot, the value returned to callers, and the immutable
//! in-memory index built from a full row set.

pub mod feed;
pub mod index;

pub use feed::{parse_rows, Fingerprint, ParseError};
pub use index::TableIndex;

use serde::{Deserialize, Serialize};

/// A single row of the lookup table
///
/// Field aliases cover the naming used by the different feed producers
/// (`Country`, `giw_branch`, `lvid`, ...). Serialization always uses the
/// canonical names, which is what the fingerprint is computed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// ISO country code, the natural key
    #[serde(alias = "Country", alias = "country")]
    pub country_code: String,
    /// Branch serving the country
    #[serde(alias = "giw_branch", alias = "Branch")]
    pub branch: String,
    /// Legal entity identifier
    #[serde(alias = "lvid", alias = "Legal Entity")]
    pub legal_entity: String,
}

impl Row {
    pub fn new(
        country_code: impl Into<String>,
        branch: impl Into<String>,
        legal_entity: impl Into<String>,
    ) -> Self {
        Self {
            country_code: country_code.into(),
            branch: branch.into(),
            legal_entity: legal_entity.into(),
        }
    }
}

/// Answer to a lookup: the branch and legal entity for a country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchEntity {
    pub branch: String,
    pub legal_entity: String,
}
