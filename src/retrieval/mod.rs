//! Semantic retrieval over fact strings.
//!
//! A [`RetrievalIndex`] embeds a corpus once, L2-normalizes every vector, and
//! answers top-k queries by exact inner product (cosine similarity on unit
//! vectors). It is immutable after build; a rebuild produces a whole new
//! index, and [`SharedRetrievalIndex`] swaps it in atomically.

mod flat;
mod shared;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::{l2_normalize, Embedder};
use crate::error::RetrievalError;
use crate::facts::ProvenanceFact;

pub use flat::{FlatInnerProductIndex, NO_MATCH};
pub use shared::SharedRetrievalIndex;

/// One corpus entry: the fact string and, when built from facts, its record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalDocument {
    /// Fact string that was embedded.
    pub text: String,
    /// Source record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<ProvenanceFact>,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 0-based rank.
    pub rank: usize,
    /// Insertion index of the document.
    pub index: usize,
    /// Fact string.
    pub fact: String,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
    /// Source record, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<ProvenanceFact>,
}

/// Immutable embedded corpus with an exact similarity store.
pub struct RetrievalIndex {
    embedder: Arc<dyn Embedder>,
    documents: Vec<RetrievalDocument>,
    store: Option<FlatInnerProductIndex>,
    built_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for RetrievalIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrievalIndex")
            .field("dimension", &self.embedder.dimension())
            .field("documents", &self.documents.len())
            .field("built_at", &self.built_at)
            .finish_non_exhaustive()
    }
}

impl RetrievalIndex {
    /// Creates an unbuilt index. Searching it returns no hits.
    #[must_use]
    pub fn empty(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            documents: Vec::new(),
            store: None,
            built_at: None,
        }
    }

    /// Embeds `facts` and builds an index over them.
    ///
    /// An empty corpus yields an index whose searches return nothing.
    ///
    /// # Errors
    /// Returns [`RetrievalError`] if the embedder fails, or returns the
    /// wrong number of vectors or vectors of the wrong dimensionality.
    pub fn build(embedder: Arc<dyn Embedder>, facts: Vec<String>) -> Result<Self, RetrievalError> {
        let documents = facts
            .into_iter()
            .map(|text| RetrievalDocument { text, record: None })
            .collect();
        Self::build_documents(embedder, documents)
    }

    /// Builds an index over rendered provenance facts, keeping the records.
    ///
    /// # Errors
    /// See [`RetrievalIndex::build`].
    pub fn build_from_facts(
        embedder: Arc<dyn Embedder>,
        facts: &[ProvenanceFact],
    ) -> Result<Self, RetrievalError> {
        let documents = facts
            .iter()
            .map(|f| RetrievalDocument {
                text: f.render(),
                record: Some(f.clone()),
            })
            .collect();
        Self::build_documents(embedder, documents)
    }

    fn build_documents(
        embedder: Arc<dyn Embedder>,
        documents: Vec<RetrievalDocument>,
    ) -> Result<Self, RetrievalError> {
        let built_at = Some(Utc::now());
        if documents.is_empty() {
            tracing::info!("retrieval corpus is empty; index will return no results");
            return Ok(Self {
                embedder,
                documents,
                store: None,
                built_at,
            });
        }

        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != documents.len() {
            return Err(RetrievalError::BatchSizeMismatch {
                actual: vectors.len(),
                expected: documents.len(),
            });
        }
        let mut store = FlatInnerProductIndex::new(embedder.dimension())?;
        for mut vector in vectors {
            l2_normalize(&mut vector);
            store.add(&vector)?;
        }

        tracing::info!(
            documents = documents.len(),
            dimension = store.dimension(),
            "built retrieval index"
        );
        Ok(Self {
            embedder,
            documents,
            store: Some(store),
            built_at,
        })
    }

    /// Top-k documents for `query`, best first; ties keep insertion order.
    ///
    /// Asking for more than the corpus holds returns the whole corpus. An
    /// empty or unbuilt index returns nothing.
    ///
    /// # Errors
    /// Returns [`RetrievalError::DimensionMismatch`] if the embedder's query
    /// vector does not match the stored dimensionality, or the embedder's
    /// own error.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, RetrievalError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut q = self.embedder.embed(query)?;
        l2_normalize(&mut q);
        // The store pads to k; clamping keeps a huge k from allocating padding.
        let slots = store.search(&q, k.min(self.documents.len()))?;
        Ok(self.hits_from_slots(slots))
    }

    /// Maps store slots to ranked hits, dropping `NO_MATCH` padding.
    fn hits_from_slots(&self, slots: Vec<(i64, f32)>) -> Vec<SearchHit> {
        slots
            .into_iter()
            .filter_map(|(idx, score)| {
                let i = usize::try_from(idx).ok()?;
                let doc = self.documents.get(i)?;
                Some((i, doc, score))
            })
            .enumerate()
            .map(|(rank, (index, doc, score))| SearchHit {
                rank,
                index,
                fact: doc.text.clone(),
                score,
                record: doc.record.clone(),
            })
            .collect()
    }

    /// Corpus documents in insertion order.
    #[must_use]
    pub fn documents(&self) -> &[RetrievalDocument] {
        &self.documents
    }

    /// Stored (normalized) embedding of document `idx`.
    #[must_use]
    pub fn embedding(&self, idx: usize) -> Option<&[f32]> {
        self.store.as_ref().and_then(|s| s.vector(idx))
    }

    /// Number of documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if there is nothing to search.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_none()
    }

    /// When the index was built, or `None` if it never was.
    #[must_use]
    pub const fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    /// The shared embedder.
    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{lexical_embedding, LexicalEmbedder, DEFAULT_EMBEDDING_DIM};
    use crate::entity::EntityId;

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(LexicalEmbedder::default())
    }

    /// Returns the same vector for every text.
    struct ConstantEmbedder;

    impl Embedder for ConstantEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(vec![1.0, 1.0])
        }
    }

    /// Claims one dimension, produces another.
    struct LyingEmbedder;

    impl Embedder for LyingEmbedder {
        fn dimension(&self) -> usize {
            4
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(vec![1.0])
        }
    }

    /// Drops the last text of every batch.
    struct ShortBatchEmbedder;

    impl Embedder for ShortBatchEmbedder {
        fn dimension(&self) -> usize {
            DEFAULT_EMBEDDING_DIM
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(lexical_embedding(text))
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            let keep = texts.len().saturating_sub(1);
            texts[..keep].iter().map(|t| self.embed(t)).collect()
        }
    }

    /// Model that cannot run.
    struct BrokenEmbedder;

    impl Embedder for BrokenEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
            Err(RetrievalError::Embedding {
                message: "session closed".to_string(),
            })
        }
    }

    fn corpus() -> Vec<String> {
        vec![
            "Hanoi absorbed Ha Tay".to_string(),
            "Da Nang was formed by Quang Nam".to_string(),
            "Hue merged into Thua Thien".to_string(),
        ]
    }

    #[test]
    fn test_exact_text_ranks_first_with_max_score() {
        let index = RetrievalIndex::build(embedder(), corpus()).unwrap();
        let hits = index.search("Da Nang was formed by Quang Nam", 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].index, 1);
        assert_eq!(hits[0].fact, corpus()[1]);
        assert!((hits[0].score - 1.0).abs() < 1e-5);

        let all = index.search("Da Nang was formed by Quang Nam", 3).unwrap();
        assert!(all.iter().all(|h| h.score <= hits[0].score + 1e-6));
    }

    #[test]
    fn test_empty_corpus_returns_nothing() {
        let index = RetrievalIndex::build(embedder(), Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search("anything", 5).unwrap().is_empty());
        assert!(index.built_at().is_some());
    }

    #[test]
    fn test_unbuilt_index_returns_nothing() {
        let index = RetrievalIndex::empty(embedder());
        assert!(index.search("anything", 5).unwrap().is_empty());
        assert!(index.built_at().is_none());
    }

    #[test]
    fn test_k_larger_than_corpus_returns_all() {
        let index = RetrievalIndex::build(embedder(), corpus()).unwrap();
        let hits = index.search("Quang Nam", 10).unwrap();
        assert_eq!(hits.len(), 3);
        let ranks: Vec<_> = hits.iter().map(|h| h.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[test]
    fn test_scores_descending() {
        let index = RetrievalIndex::build(embedder(), corpus()).unwrap();
        let hits = index.search("Hue Thua Thien", 3).unwrap();
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].index, 2);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = RetrievalIndex::build(Arc::new(ConstantEmbedder), corpus()).unwrap();
        let hits = index.search("whatever", 3).unwrap();
        assert_eq!(hits.iter().map(|h| h.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_padded_slots_are_filtered() {
        let index = RetrievalIndex::build(embedder(), corpus()).unwrap();
        let mut q = index.embedder().embed("Quang Nam").unwrap();
        l2_normalize(&mut q);
        let raw = index.store.as_ref().unwrap().search(&q, 5).unwrap();
        assert_eq!(raw.iter().filter(|(i, _)| *i == NO_MATCH).count(), 2);

        let hits = index.hits_from_slots(raw);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.index < 3 && h.score.is_finite()));
        assert_eq!(hits.iter().map(|h| h.rank).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(hits, index.search("Quang Nam", 5).unwrap());
    }

    #[test]
    fn test_short_batch_is_count_mismatch() {
        let err = RetrievalIndex::build(Arc::new(ShortBatchEmbedder), corpus()).unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::BatchSizeMismatch {
                actual: 2,
                expected: 3
            }
        ));
        assert!(format!("{err}").contains("2 vectors for 3 documents"));
    }

    #[test]
    fn test_embedder_failure_propagates() {
        let err = RetrievalIndex::build(Arc::new(BrokenEmbedder), corpus()).unwrap_err();
        assert!(matches!(err, RetrievalError::Embedding { .. }));
    }

    #[test]
    fn test_k_zero() {
        let index = RetrievalIndex::build(embedder(), corpus()).unwrap();
        assert!(index.search("Hue", 0).unwrap().is_empty());
    }

    #[test]
    fn test_inconsistent_embedder_fails_build() {
        let err = RetrievalIndex::build(Arc::new(LyingEmbedder), corpus()).unwrap_err();
        assert!(matches!(err, RetrievalError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_stored_embeddings_are_unit_length() {
        let index = RetrievalIndex::build(embedder(), corpus()).unwrap();
        let v = index.embedding(0).unwrap();
        let n: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((n - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_build_from_facts_keeps_records() {
        let fact = ProvenanceFact {
            new_province: EntityId::new("urn:dn"),
            new_label: "Đà Nẵng".to_string(),
            old_province: EntityId::new("urn:qn"),
            old_label: "Quang Nam".to_string(),
        };
        let index = RetrievalIndex::build_from_facts(embedder(), &[fact.clone()]).unwrap();
        let hits = index.search("quang nam", 1).unwrap();
        assert_eq!(hits[0].record.as_ref(), Some(&fact));
        assert_eq!(hits[0].fact, fact.render());
    }
}
