//! Merge/resolution engine.
//!
//! Reconciles the mapping table's labels against the source label index and
//! writes a provenance graph:
//!
//! - the new side resolves through the index, or gets a minted identifier
//!   (typed and labeled once per identifier)
//! - the old side must resolve; a pair with an unknown predecessor is skipped
//!   without emitting anything for the old side
//! - every linked pair emits `formedBy(new, old)` and `mergedInto(old, new)`
//!
//! The engine is the only writer of the merged graph and never mutates the
//! label index.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::entity::{mint_entity_id, normalize_label, EntityId, LabelIndex};
use crate::graph::vocab::DEFAULT_ENTITY_NAMESPACE;
use crate::graph::{Graph, Predicate, Term, Vocabulary};
use crate::mapping::MappingPair;

/// Why a pair produced no provenance edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PairSkip {
    /// The old label is absent from the label index.
    UnresolvedOldLabel {
        /// The label as it appeared in the mapping.
        label: String,
    },
}

/// A resolved `(new, old)` provenance link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceLink {
    /// Successor entity.
    pub new: EntityId,
    /// Predecessor entity.
    pub old: EntityId,
    /// True if the successor identifier was minted rather than resolved.
    pub new_minted: bool,
}

/// Result of merging one pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    /// Both sides known; edges emitted.
    Linked(ProvenanceLink),
    /// Pair dropped.
    Skipped(PairSkip),
}

/// Counters for a merge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Pairs examined.
    pub pairs_seen: usize,
    /// Pairs that produced provenance edges.
    pub pairs_linked: usize,
    /// Pairs dropped because the old label did not resolve.
    pub pairs_skipped: usize,
    /// Distinct unresolved old labels, compared by lookup key, in
    /// first-seen spelling and order.
    pub unresolved_old_labels: Vec<String>,
    /// Identifiers minted and emitted during this run.
    pub minted_entities: usize,
    /// Entities carrying a `type` assertion in the output graph.
    pub entities: usize,
    /// `formedBy` edges in the output graph.
    pub formed_by_edges: usize,
    /// `mergedInto` edges in the output graph.
    pub merged_into_edges: usize,
    /// Triples in the output graph.
    pub triples: usize,
}

/// A merged graph plus its report.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Provenance graph.
    pub graph: Graph,
    /// Counters.
    pub report: MergeReport,
}

/// Resolves mapping pairs against a label index and emits provenance triples.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    vocab: Vocabulary,
    entity_namespace: String,
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new(Vocabulary::default(), DEFAULT_ENTITY_NAMESPACE)
    }
}

impl MergeEngine {
    /// Creates an engine minting identifiers under `entity_namespace`.
    #[must_use]
    pub fn new(vocab: Vocabulary, entity_namespace: impl Into<String>) -> Self {
        Self {
            vocab,
            entity_namespace: entity_namespace.into(),
        }
    }

    /// The vocabulary used for emitted triples.
    #[must_use]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Namespace for minted identifiers.
    #[must_use]
    pub fn entity_namespace(&self) -> &str {
        &self.entity_namespace
    }

    /// Merges `pairs` into a fresh graph.
    #[must_use]
    pub fn merge(&self, index: &LabelIndex, pairs: &[MappingPair]) -> MergeOutcome {
        let mut graph = Graph::new();
        let report = self.merge_into(index, pairs, &mut graph);
        MergeOutcome { graph, report }
    }

    /// Merges `pairs` into an existing graph.
    ///
    /// Emission checks look at `graph`, so merging the same pairs again adds
    /// nothing new.
    pub fn merge_into(&self, index: &LabelIndex, pairs: &[MappingPair], graph: &mut Graph) -> MergeReport {
        let mut report = MergeReport::default();
        let mut unresolved_seen: HashSet<String> = HashSet::new();

        for pair in pairs {
            report.pairs_seen += 1;
            let (outcome, minted_now) = self.merge_pair(index, pair, graph);
            if minted_now {
                report.minted_entities += 1;
            }
            match outcome {
                PairOutcome::Linked(link) => {
                    report.pairs_linked += 1;
                    tracing::debug!(new = %link.new, old = %link.old, minted = link.new_minted, "linked pair");
                }
                PairOutcome::Skipped(PairSkip::UnresolvedOldLabel { label }) => {
                    report.pairs_skipped += 1;
                    tracing::warn!(old = %label, new = %pair.new_label, "old label not in source graph; pair skipped");
                    if unresolved_seen.insert(normalize_label(&pair.old_label)) {
                        report.unresolved_old_labels.push(label);
                    }
                }
            }
        }

        let stats = graph.stats();
        report.entities = stats.typed_entities;
        report.formed_by_edges = stats.formed_by;
        report.merged_into_edges = stats.merged_into;
        report.triples = stats.triples;

        tracing::info!(
            pairs = report.pairs_seen,
            linked = report.pairs_linked,
            skipped = report.pairs_skipped,
            minted = report.minted_entities,
            entities = report.entities,
            triples = report.triples,
            "merge complete"
        );
        report
    }

    /// Merges one pair. Returns the outcome and whether a minted entity was
    /// emitted for the new side by this call.
    pub fn merge_pair(&self, index: &LabelIndex, pair: &MappingPair, graph: &mut Graph) -> (PairOutcome, bool) {
        let class = Term::iri(self.vocab.province_class());

        let (new_id, new_minted, minted_now) = match index.resolve(&pair.new_label) {
            Some(id) => (id.clone(), false, false),
            None => {
                let id = mint_entity_id(&self.entity_namespace, &pair.new_label);
                let emit = !graph.has_type(id.as_str());
                if emit {
                    graph.add(id.as_str(), Predicate::Type, class.clone());
                    graph.add(id.as_str(), Predicate::Label, Term::literal(pair.new_label.as_str()));
                    graph.add(
                        id.as_str(),
                        Predicate::CanonicalLabel,
                        Term::literal(pair.new_label.as_str()),
                    );
                }
                (id, true, emit)
            }
        };

        let Some(old_id) = index.resolve(&pair.old_label) else {
            return (
                PairOutcome::Skipped(PairSkip::UnresolvedOldLabel {
                    label: pair.old_label.clone(),
                }),
                minted_now,
            );
        };

        if !graph.has_type(old_id.as_str()) {
            graph.add(old_id.as_str(), Predicate::Type, class);
            graph.add(
                old_id.as_str(),
                Predicate::CanonicalLabel,
                Term::literal(pair.old_label.as_str()),
            );
        }

        graph.add(new_id.as_str(), Predicate::FormedBy, Term::iri(old_id.as_str()));
        graph.add(old_id.as_str(), Predicate::MergedInto, Term::iri(new_id.as_str()));

        (
            PairOutcome::Linked(ProvenanceLink {
                new: new_id,
                old: old_id.clone(),
                new_minted,
            }),
            minted_now,
        )
    }
}
