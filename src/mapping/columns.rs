//! Header-tolerant column lookup for mapping records.
//!
//! A logical column is matched against a record's headers in three tiers:
//! exact key, then trimmed key, then case-insensitive trimmed key. Within a
//! tier the first header (in record order) wins.

use serde::{Deserialize, Serialize};

/// One header-keyed row of the mapping table, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header/value pair.
    #[must_use]
    pub fn with(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((header.into(), value.into()));
        self
    }

    /// Header/value pairs in header order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

impl<K, V> FromIterator<(K, V)> for RawRecord
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Which lookup tier matched a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMatch {
    /// Header equals the logical name byte for byte.
    Exact,
    /// Header equals the logical name after trimming both.
    Trimmed,
    /// Header equals the logical name after trimming and case folding both.
    CaseInsensitive,
}

/// Finds the value of `column` in `record`, returning it with the tier that matched.
#[must_use]
pub fn lookup_column<'a>(record: &'a RawRecord, column: &str) -> Option<(&'a str, ColumnMatch)> {
    let fields = record.fields();

    if let Some((_, v)) = fields.iter().find(|(k, _)| k == column) {
        return Some((v.as_str(), ColumnMatch::Exact));
    }

    let trimmed = column.trim();
    if let Some((_, v)) = fields.iter().find(|(k, _)| k.trim() == trimmed) {
        return Some((v.as_str(), ColumnMatch::Trimmed));
    }

    let folded = trimmed.to_lowercase();
    fields
        .iter()
        .find(|(k, _)| k.trim().to_lowercase() == folded)
        .map(|(_, v)| (v.as_str(), ColumnMatch::CaseInsensitive))
}

/// Looks up `column` and returns its trimmed value, or `None` if absent or blank.
#[must_use]
pub fn required_cell<'a>(record: &'a RawRecord, column: &str) -> Option<&'a str> {
    lookup_column(record, column)
        .map(|(v, _)| v.trim())
        .filter(|v| !v.is_empty())
}
