//! Triple model for the source snapshot and the merged provenance graph.
//!
//! A [`Graph`] is an append-only set of [`Triple`]s. It remembers insertion
//! order so that anything derived by iterating it (label indexes, facts) is
//! deterministic for a given input, and it ignores re-insertion of a triple
//! it already holds.

mod ntriples;
pub mod vocab;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use ntriples::{read_ntriples, to_ntriples_string, write_ntriples};
pub use vocab::Vocabulary;

/// A plain literal with an optional language tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Literal {
    /// Lexical value.
    pub value: String,

    /// Language tag, e.g. `en`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl Literal {
    /// Creates an untagged literal.
    #[must_use]
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            lang: None,
        }
    }

    /// Creates a language-tagged literal.
    #[must_use]
    pub fn tagged(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            lang: Some(lang.into()),
        }
    }
}

/// Object position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Term {
    /// A resource reference.
    Iri {
        /// The IRI.
        iri: String,
    },
    /// A literal value.
    Literal(Literal),
}

impl Term {
    /// Creates an IRI term.
    #[must_use]
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Iri { iri: iri.into() }
    }

    /// Creates an untagged literal term.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(Literal::plain(value))
    }

    /// Returns the IRI if this term is one.
    #[must_use]
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Iri { iri } => Some(iri),
            Self::Literal(_) => None,
        }
    }

    /// Returns the literal if this term is one.
    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(lit) => Some(lit),
            Self::Iri { .. } => None,
        }
    }
}

/// Predicates the merge engine understands.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// `rdf:type`
    Type,
    /// `rdfs:label`
    Label,
    /// `ex:canonicalLabel`
    CanonicalLabel,
    /// `ex:formedBy` (new → old)
    FormedBy,
    /// `ex:mergedInto` (old → new)
    MergedInto,
    /// Any other predicate, by IRI.
    Other(String),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type => write!(f, "type"),
            Self::Label => write!(f, "label"),
            Self::CanonicalLabel => write!(f, "canonicalLabel"),
            Self::FormedBy => write!(f, "formedBy"),
            Self::MergedInto => write!(f, "mergedInto"),
            Self::Other(iri) => write!(f, "<{iri}>"),
        }
    }
}

/// A subject-predicate-object statement. Subjects are always IRIs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Triple {
    /// Subject IRI.
    pub subject: String,
    /// Predicate.
    pub predicate: Predicate,
    /// Object term.
    pub object: Term,
}

impl Triple {
    /// Creates a triple.
    #[must_use]
    pub fn new(subject: impl Into<String>, predicate: Predicate, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object,
        }
    }
}

/// Summary counts for a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total triples.
    pub triples: usize,
    /// Distinct subjects.
    pub subjects: usize,
    /// Subjects carrying at least one `type` assertion.
    pub typed_entities: usize,
    /// `formedBy` edges.
    pub formed_by: usize,
    /// `mergedInto` edges.
    pub merged_into: usize,
}

/// Append-only, insertion-ordered triple set.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    triples: Vec<Triple>,
    index: HashSet<Triple>,
    typed: HashSet<String>,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a triple. Returns false if it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if self.index.contains(&triple) {
            return false;
        }
        if triple.predicate == Predicate::Type {
            self.typed.insert(triple.subject.clone());
        }
        self.index.insert(triple.clone());
        self.triples.push(triple);
        true
    }

    /// Convenience wrapper around [`Graph::insert`].
    pub fn add(&mut self, subject: impl Into<String>, predicate: Predicate, object: Term) -> bool {
        self.insert(Triple::new(subject, predicate, object))
    }

    /// Returns true if the exact triple is present.
    #[must_use]
    pub fn contains(&self, triple: &Triple) -> bool {
        self.index.contains(triple)
    }

    /// Returns true if `subject` has any `type` assertion.
    #[must_use]
    pub fn has_type(&self, subject: &str) -> bool {
        self.typed.contains(subject)
    }

    /// Objects of `(subject, predicate, ?)` in insertion order.
    pub fn objects<'a>(
        &'a self,
        subject: &'a str,
        predicate: Predicate,
    ) -> impl Iterator<Item = &'a Term> + 'a {
        self.triples
            .iter()
            .filter(move |t| t.subject == subject && t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// Triples with the given predicate, in insertion order.
    pub fn with_predicate(&self, predicate: Predicate) -> impl Iterator<Item = &Triple> + '_ {
        self.triples.iter().filter(move |t| t.predicate == predicate)
    }

    /// `(subject, label)` pairs for every literal `label` triple, in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.triples
            .iter()
            .filter(|t| t.predicate == Predicate::Label)
            .filter_map(|t| {
                t.object
                    .as_literal()
                    .map(|lit| (t.subject.as_str(), lit.value.as_str()))
            })
    }

    /// Iterates triples in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    /// Triples sorted into a canonical order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Triple> {
        let mut out: Vec<&Triple> = self.triples.iter().collect();
        out.sort();
        out
    }

    /// Number of triples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Returns true if the graph holds no triples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Computes summary counts.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let subjects: HashSet<&str> = self.triples.iter().map(|t| t.subject.as_str()).collect();
        let mut stats = GraphStats {
            triples: self.triples.len(),
            subjects: subjects.len(),
            typed_entities: self.typed.len(),
            ..GraphStats::default()
        };
        for t in &self.triples {
            match t.predicate {
                Predicate::FormedBy => stats.formed_by += 1,
                Predicate::MergedInto => stats.merged_into += 1,
                _ => {}
            }
        }
        stats
    }
}

/// Two graphs are equal when they hold the same triple set, regardless of
/// insertion order.
impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Graph {}

impl Extend<Triple> for Graph {
    fn extend<I: IntoIterator<Item = Triple>>(&mut self, iter: I) {
        for t in iter {
            self.insert(t);
        }
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut g = Self::new();
        g.extend(iter);
        g
    }
}
