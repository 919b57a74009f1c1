//! Queryable facts over a merged provenance graph.
//!
//! A [`ProvenanceFact`] joins one `formedBy(new, old)` edge with the
//! canonical labels of both ends. Edges where either end has no canonical
//! label are not facts. Facts are the unit of semantic retrieval.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::graph::{Graph, Predicate, Term};

/// A flattened "new region was formed by old region" fact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProvenanceFact {
    /// Successor entity.
    pub new_province: EntityId,
    /// Successor canonical label.
    pub new_label: String,
    /// Predecessor entity.
    pub old_province: EntityId,
    /// Predecessor canonical label.
    pub old_label: String,
}

impl ProvenanceFact {
    /// Renders the fact string used for embedding and prompting.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProvenanceFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new_province: {} | new_label: {} | old_province: {} | old_label: {}",
            self.new_province, self.new_label, self.old_province, self.old_label
        )
    }
}

fn canonical_label<'a>(graph: &'a Graph, subject: &'a str) -> Option<&'a str> {
    graph
        .objects(subject, Predicate::CanonicalLabel)
        .find_map(Term::as_literal)
        .map(|lit| lit.value.as_str())
}

/// Extracts every provenance fact, ordered by `(new_label, old_label)`.
#[must_use]
pub fn provenance_facts(graph: &Graph) -> Vec<ProvenanceFact> {
    let mut facts: Vec<ProvenanceFact> = graph
        .with_predicate(Predicate::FormedBy)
        .filter_map(|t| {
            let old = t.object.as_iri()?;
            let new_label = canonical_label(graph, &t.subject)?;
            let old_label = canonical_label(graph, old)?;
            Some(ProvenanceFact {
                new_province: EntityId::new(t.subject.as_str()),
                new_label: new_label.to_string(),
                old_province: EntityId::new(old),
                old_label: old_label.to_string(),
            })
        })
        .collect();

    facts.sort_by(|a, b| {
        a.new_label
            .cmp(&b.new_label)
            .then_with(|| a.old_label.cmp(&b.old_label))
            .then_with(|| a.new_province.cmp(&b.new_province))
            .then_with(|| a.old_province.cmp(&b.old_province))
    });
    facts
}

/// Renders facts into the strings fed to the retrieval index.
#[must_use]
pub fn fact_strings(facts: &[ProvenanceFact]) -> Vec<String> {
    facts.iter().map(ProvenanceFact::render).collect()
}
