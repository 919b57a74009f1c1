//! Entity identity types.
//!
//! An administrative region is anchored by an [`EntityId`]: an opaque,
//! IRI-shaped string that is either taken from the external linked-data
//! source or minted locally from a label.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::{Graph, Literal, Predicate, Term, Vocabulary};

/// Globally unique, stable entity identifier.
///
/// # Examples
///
/// ```
/// use provkg::EntityId;
///
/// let id = EntityId::new("http://dbpedia.org/resource/Hanoi");
/// assert_eq!(id.as_str(), "http://dbpedia.org/resource/Hanoi");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Wraps an identifier string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this identifier lives under `namespace`.
    #[must_use]
    pub fn is_in_namespace(&self, namespace: &str) -> bool {
        self.0.starts_with(namespace)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// An `(identifier, label)` pair as delivered by the external source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledEntity {
    /// Source identifier.
    pub id: EntityId,

    /// Display label.
    pub label: String,

    /// Language tag of the label, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl LabeledEntity {
    /// Creates an untagged labeled entity.
    #[must_use]
    pub fn new(id: impl Into<EntityId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            lang: None,
        }
    }

    /// Sets the label's language tag.
    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }
}

/// Builds the source snapshot graph for a set of labeled entities.
///
/// The snapshot declares the `Province` class, then asserts `type` and
/// `label` for every entity in input order.
#[must_use]
pub fn snapshot_graph(entities: &[LabeledEntity], vocab: &Vocabulary) -> Graph {
    let class = vocab.province_class();
    let mut g = Graph::new();
    g.add(
        class.as_str(),
        Predicate::Type,
        Term::iri(crate::graph::vocab::RDFS_CLASS),
    );
    g.add(class.as_str(), Predicate::Label, Term::literal("Province"));

    for entity in entities {
        g.add(entity.id.as_str(), Predicate::Type, Term::iri(class.as_str()));
        let label = Literal {
            value: entity.label.clone(),
            lang: entity.lang.clone(),
        };
        g.add(entity.id.as_str(), Predicate::Label, Term::Literal(label));
    }
    g
}

/// Reads `(identifier, label)` pairs back out of a snapshot graph.
///
/// Labels on the class resource itself are skipped.
#[must_use]
pub fn entities_from_graph(graph: &Graph, vocab: &Vocabulary) -> Vec<LabeledEntity> {
    let class = vocab.province_class();
    graph
        .iter()
        .filter(|t| t.predicate == Predicate::Label && t.subject != class)
        .filter_map(|t| {
            t.object.as_literal().map(|lit| LabeledEntity {
                id: EntityId::new(t.subject.as_str()),
                label: lit.value.clone(),
                lang: lit.lang.clone(),
            })
        })
        .collect()
}
