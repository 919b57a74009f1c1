//! Entity layer modules.
//!
//! This module groups entity identity, the label index, and identifier minting.

pub mod entity;
pub mod label_index;
pub mod slug;

pub use entity::{entities_from_graph, snapshot_graph, EntityId, LabeledEntity};
pub use label_index::{normalize_label, LabelIndex};
pub use slug::{fold_diacritics, mint_entity_id, slugify};
