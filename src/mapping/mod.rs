//! Mapping table layer.
//!
//! Reads a tabular old-label/new-label correspondence that tolerates header
//! whitespace and casing variance, and expands multi-valued cells into pairs.

pub mod columns;
pub mod parser;

pub use columns::{lookup_column, required_cell, ColumnMatch, RawRecord};
pub use parser::{
    MappingPair, MappingParser, MappingRow, MappingTable, ParseReport, RowOutcome, RowSkip,
    NEW_PROVINCE_COLUMN, OLD_LABEL_DELIMITER, OLD_PROVINCE_COLUMN,
};
