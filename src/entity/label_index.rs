//! Normalized label → identifier lookup.
//!
//! Normalization is trim + case fold. When two entities share a normalized
//! label, the first one seen keeps it; later ones are shadowed without error
//! (source data routinely carries duplicate labels, e.g. disambiguation
//! resources). The index is immutable once built.

use std::collections::HashMap;

use crate::entity::{EntityId, LabeledEntity};
use crate::graph::Graph;

/// Normalizes a label for lookup: trim surrounding whitespace, then case fold.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Read-only mapping from normalized label to entity identifier.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    by_label: HashMap<String, EntityId>,
    shadowed: usize,
}

impl LabelIndex {
    /// Builds an index from `(identifier, label)` pairs in iteration order.
    pub fn build<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (EntityId, S)>,
        S: AsRef<str>,
    {
        let mut by_label = HashMap::new();
        let mut shadowed = 0usize;
        for (id, label) in entries {
            let key = normalize_label(label.as_ref());
            if by_label.contains_key(&key) {
                shadowed += 1;
                continue;
            }
            by_label.insert(key, id);
        }
        tracing::debug!(labels = by_label.len(), shadowed, "built label index");
        Self { by_label, shadowed }
    }

    /// Builds an index from labeled entities.
    pub fn from_entities<'a, I>(entities: I) -> Self
    where
        I: IntoIterator<Item = &'a LabeledEntity>,
    {
        Self::build(entities.into_iter().map(|e| (e.id.clone(), e.label.as_str())))
    }

    /// Builds an index from every literal `label` triple of a graph.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        Self::build(graph.labels().map(|(s, l)| (EntityId::new(s), l)))
    }

    /// Resolves a label, applying the same normalization used at build time.
    #[must_use]
    pub fn resolve(&self, label: &str) -> Option<&EntityId> {
        self.by_label.get(&normalize_label(label))
    }

    /// Number of distinct normalized labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_label.len()
    }

    /// Returns true if the index holds no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_label.is_empty()
    }

    /// Number of entries dropped because their label was already bound.
    #[must_use]
    pub fn shadowed(&self) -> usize {
        self.shadowed
    }
}
