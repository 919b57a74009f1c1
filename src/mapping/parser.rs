//! Old-label/new-label mapping table parser.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};

use super::columns::{required_cell, RawRecord};
use crate::error::MappingError;

/// Logical column holding the post-merge region label.
pub const NEW_PROVINCE_COLUMN: &str = "new_province";

/// Logical column holding the pre-merge region label(s).
pub const OLD_PROVINCE_COLUMN: &str = "old_province";

/// Separator between multiple old labels in one cell.
pub const OLD_LABEL_DELIMITER: char = '|';

/// A parsed mapping row: one new region absorbing one or more old ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRow {
    /// Old labels in cell order, trimmed, never empty strings.
    pub old_labels: Vec<String>,
    /// New label, trimmed, never empty.
    pub new_label: String,
}

impl MappingRow {
    /// Expands the row into `(old, new)` pairs, in old-label order.
    pub fn pairs(&self) -> impl Iterator<Item = MappingPair> + '_ {
        self.old_labels.iter().map(|old| MappingPair {
            old_label: old.clone(),
            new_label: self.new_label.clone(),
        })
    }
}

/// One `(old label, new label)` correspondence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingPair {
    /// Pre-merge label.
    pub old_label: String,
    /// Post-merge label.
    pub new_label: String,
}

impl MappingPair {
    /// Creates a pair.
    #[must_use]
    pub fn new(old_label: impl Into<String>, new_label: impl Into<String>) -> Self {
        Self {
            old_label: old_label.into(),
            new_label: new_label.into(),
        }
    }
}

/// Why a row produced no pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowSkip {
    /// The new-label column is absent or blank.
    MissingNewLabel,
    /// The old-label column is absent or blank.
    MissingOldLabels,
    /// The old-label cell held only delimiters and whitespace.
    EmptyOldSegments,
}

/// Result of parsing one raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// The row yielded at least one pair.
    Accepted(MappingRow),
    /// The row was malformed and dropped.
    Skipped(RowSkip),
}

/// Counters for a parse run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    /// Records examined.
    pub rows_seen: usize,
    /// Records that yielded pairs.
    pub rows_accepted: usize,
    /// Records dropped for a missing new label.
    pub missing_new_label: usize,
    /// Records dropped for a missing old label cell.
    pub missing_old_labels: usize,
    /// Records dropped because every old segment was empty.
    pub empty_old_segments: usize,
    /// Pairs produced.
    pub pairs: usize,
}

impl ParseReport {
    /// Total rows dropped.
    #[must_use]
    pub const fn rows_skipped(&self) -> usize {
        self.missing_new_label + self.missing_old_labels + self.empty_old_segments
    }

    fn record(&mut self, outcome: &RowOutcome) {
        self.rows_seen += 1;
        match outcome {
            RowOutcome::Accepted(row) => {
                self.rows_accepted += 1;
                self.pairs += row.old_labels.len();
            }
            RowOutcome::Skipped(RowSkip::MissingNewLabel) => self.missing_new_label += 1,
            RowOutcome::Skipped(RowSkip::MissingOldLabels) => self.missing_old_labels += 1,
            RowOutcome::Skipped(RowSkip::EmptyOldSegments) => self.empty_old_segments += 1,
        }
    }
}

/// Accepted rows plus the parse counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    /// Accepted rows in input order.
    pub rows: Vec<MappingRow>,
    /// Counters.
    pub report: ParseReport,
}

impl MappingTable {
    /// Flattens rows into pairs: row order first, then old-label order.
    #[must_use]
    pub fn pairs(&self) -> Vec<MappingPair> {
        self.rows.iter().flat_map(MappingRow::pairs).collect()
    }
}

/// Parses mapping records into [`MappingRow`]s.
#[derive(Debug, Clone)]
pub struct MappingParser {
    new_column: String,
    old_column: String,
    delimiter: char,
}

impl Default for MappingParser {
    fn default() -> Self {
        Self {
            new_column: NEW_PROVINCE_COLUMN.to_string(),
            old_column: OLD_PROVINCE_COLUMN.to_string(),
            delimiter: OLD_LABEL_DELIMITER,
        }
    }
}

impl MappingParser {
    /// Creates a parser for the default column names and delimiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the logical column names.
    #[must_use]
    pub fn columns(mut self, new_column: impl Into<String>, old_column: impl Into<String>) -> Self {
        self.new_column = new_column.into();
        self.old_column = old_column.into();
        self
    }

    /// Overrides the old-label delimiter.
    #[must_use]
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Parses a single record.
    #[must_use]
    pub fn parse_record(&self, record: &RawRecord) -> RowOutcome {
        let Some(new_label) = required_cell(record, &self.new_column) else {
            return RowOutcome::Skipped(RowSkip::MissingNewLabel);
        };
        let Some(old_field) = required_cell(record, &self.old_column) else {
            return RowOutcome::Skipped(RowSkip::MissingOldLabels);
        };

        let old_labels: Vec<String> = old_field
            .split(self.delimiter)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if old_labels.is_empty() {
            return RowOutcome::Skipped(RowSkip::EmptyOldSegments);
        }

        RowOutcome::Accepted(MappingRow {
            old_labels,
            new_label: new_label.to_string(),
        })
    }

    /// Parses a sequence of records. Malformed records are counted and dropped.
    pub fn parse<I>(&self, records: I) -> MappingTable
    where
        I: IntoIterator<Item = RawRecord>,
    {
        let mut table = MappingTable::default();
        for (idx, record) in records.into_iter().enumerate() {
            let outcome = self.parse_record(&record);
            table.report.record(&outcome);
            match outcome {
                RowOutcome::Accepted(row) => table.rows.push(row),
                RowOutcome::Skipped(reason) => {
                    tracing::warn!(row = idx + 1, ?reason, "skipping mapping row");
                }
            }
        }
        tracing::info!(
            rows = table.report.rows_seen,
            accepted = table.report.rows_accepted,
            skipped = table.report.rows_skipped(),
            pairs = table.report.pairs,
            "parsed mapping table"
        );
        table
    }

    /// Decodes a CSV table with a header row and parses it.
    ///
    /// # Errors
    /// Returns [`MappingError::Unreadable`] if the input cannot be decoded as
    /// UTF-8 CSV. Individual malformed rows are not errors.
    pub fn parse_reader<R: Read>(&self, input: R) -> Result<MappingTable, MappingError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::None)
            .from_reader(input);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if i == 0 {
                    h.trim_start_matches('\u{feff}').to_string()
                } else {
                    h.to_string()
                }
            })
            .collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let row = result?;
            records.push(
                headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| (h.as_str(), v))
                    .collect::<RawRecord>(),
            );
        }

        Ok(self.parse(records))
    }

    /// Opens and parses a CSV file.
    ///
    /// # Errors
    /// Returns [`MappingError::Io`] if the file cannot be opened, or any error
    /// from [`MappingParser::parse_reader`].
    pub fn parse_path(&self, path: impl AsRef<Path>) -> Result<MappingTable, MappingError> {
        let file = File::open(path.as_ref())?;
        self.parse_reader(file)
    }
}
