//! Immutable country code index

use std::collections::HashMap;

use super::{BranchEntity, Row};

/// In-memory lookup table built once from a full row set
///
/// There is no way to mutate an index after `build`. A refresh produces a new
/// index and swaps the `Arc` that points at it, so a reader holding the old
/// index keeps a consistent view for as long as it needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableIndex {
    entries: HashMap<String, BranchEntity>,
}

impl TableIndex {
    /// Builds an index from rows in fetch order
    ///
    /// When a country code appears more than once, the row that comes last
    /// wins.
    pub fn build<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a Row>,
    {
        let rows = rows.into_iter();
        let mut entries = HashMap::with_capacity(rows.size_hint().0);
        for row in rows {
            entries.insert(
                row.country_code.clone(),
                BranchEntity {
                    branch: row.branch.clone(),
                    legal_entity: row.legal_entity.clone(),
                },
            );
        }
        Self { entries }
    }

    /// Looks up the branch and legal entity for a country code
    pub fn lookup(&self, country_code: &str) -> Option<&BranchEntity> {
        self.entries.get(country_code)
    }

    /// Number of distinct country codes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_present_and_absent() {
        let rows = vec![Row::new("US", "NY1", "LE-US")];
        let index = TableIndex::build(&rows);

        let hit = index.lookup("US").expect("US should be present");
        assert_eq!(hit.branch, "NY1");
        assert_eq!(hit.legal_entity, "LE-US");
        assert!(index.lookup("FR").is_none());
    }

    #[test]
    fn test_duplicate_codes_last_one_wins() {
        let rows = vec![
            Row::new("US", "NY1", "LE-US"),
            Row::new("FR", "PAR", "LE-FR"),
            Row::new("US", "CHI", "LE-US2"),
        ];
        let index = TableIndex::build(&rows);

        assert_eq!(index.len(), 2);
        let hit = index.lookup("US").unwrap();
        assert_eq!(hit.branch, "CHI");
        assert_eq!(hit.legal_entity, "LE-US2");
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let rows = vec![Row::new("US", "NY1", "LE-US")];
        let index = TableIndex::build(&rows);

        assert!(index.lookup("us").is_none());
    }

    #[test]
    fn test_empty_index() {
        let index = TableIndex::build(&Vec::<Row>::new());
        assert!(index.is_empty());
        assert!(index.lookup("US").is_none());
    }
}
