//! End-to-end composition.
//!
//! ```text
//! source ──▶ snapshot graph ──▶ LabelIndex ─┐
//! mapping table ──▶ MappingParser ──────────┴▶ MergeEngine ──▶ merged graph
//! merged graph ──▶ provenance facts ──▶ SharedRetrievalIndex ──▶ answers
//! ```
//!
//! The merge stages run on one thread; the retrieval index is built once per
//! fact load and then served to any number of readers.

use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::answer::{Answer, AnswerGenerator, GeminiGenerator, TieredGenerator};
use crate::config::{Config, EmbedderKind};
#[cfg(feature = "fastembed")]
use crate::embedding::FastEmbedEmbedder;
use crate::embedding::{Embedder, LexicalEmbedder};
use crate::entity::{snapshot_graph, LabelIndex};
use crate::error::{ProvError, ProvResult};
use crate::facts::{provenance_facts, ProvenanceFact};
use crate::graph::{Graph, Vocabulary};
use crate::mapping::{MappingParser, MappingTable, ParseReport};
use crate::merge::{MergeEngine, MergeOutcome, MergeReport};
use crate::retrieval::{SearchHit, SharedRetrievalIndex};
use crate::source::EntitySource;

/// Where `ask` takes its context from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ContextMode {
    /// The `k` most similar facts.
    Retrieval {
        /// Number of facts.
        k: usize,
    },
    /// Every loaded fact, in fact order.
    AllFacts,
}

impl Default for ContextMode {
    fn default() -> Self {
        Self::Retrieval {
            k: crate::config::DEFAULT_TOP_K,
        }
    }
}

/// Counters for one full run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Mapping parse counters.
    pub parse: ParseReport,
    /// Merge counters.
    pub merge: MergeReport,
    /// Provenance facts loaded into the retrieval index.
    pub facts: usize,
}

/// Response to a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    /// The question as asked.
    pub question: String,
    /// Generated answer.
    pub answer: Answer,
    /// Context handed to the generator.
    pub context: Vec<SearchHit>,
}

/// Owns the stages and the served fact set.
///
/// The served facts live only in the retrieval index, so one snapshot swap
/// publishes both the ranked and the full-context views.
pub struct Pipeline {
    vocab: Vocabulary,
    parser: MappingParser,
    engine: MergeEngine,
    retrieval: SharedRetrievalIndex,
    generator: Arc<dyn AnswerGenerator>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("vocab", &self.vocab)
            .field("engine", &self.engine)
            .field("retrieval", &self.retrieval)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Assembles a pipeline from explicit collaborators.
    #[must_use]
    pub fn new(
        vocab: Vocabulary,
        entity_namespace: impl Into<String>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            engine: MergeEngine::new(vocab.clone(), entity_namespace),
            vocab,
            parser: MappingParser::new(),
            retrieval: SharedRetrievalIndex::new(embedder),
            generator,
        }
    }

    /// Builds the stack for `config`: the configured embedder and a tiered
    /// generator that only calls out when an API key is configured.
    ///
    /// # Errors
    /// Returns an error for a zero embedding dimension, an embedder that is
    /// not compiled in or fails to load, or if the HTTP client cannot be
    /// built.
    pub fn from_config(config: &Config) -> ProvResult<Self> {
        let embedder = embedder_for(config)?;
        let generator = if config.llm_api_key.is_some() {
            let remote = GeminiGenerator::new(
                config.llm_endpoint.as_str(),
                config.llm_model.as_str(),
                config.llm_api_key.clone(),
                config.request_timeout,
            )
            .map_err(|e| ProvError::internal(e.to_string()))?;
            TieredGenerator::new(Box::new(remote))
        } else {
            tracing::warn!("no API key configured; answers will restate retrieved facts");
            TieredGenerator::offline()
        };
        Ok(Self::new(
            Vocabulary::new(config.ontology_namespace.as_str()),
            config.entity_namespace.as_str(),
            embedder,
            Arc::new(generator),
        ))
    }

    /// Replaces the mapping parser.
    #[must_use]
    pub fn with_parser(mut self, parser: MappingParser) -> Self {
        self.parser = parser;
        self
    }

    /// The vocabulary in use.
    #[must_use]
    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Fetches entities from `source` and snapshots them as a graph.
    ///
    /// # Errors
    /// Propagates the source's [`crate::error::FetchError`].
    pub fn snapshot(&self, source: &dyn EntitySource) -> ProvResult<Graph> {
        let entities = source.fetch()?;
        let graph = snapshot_graph(&entities, &self.vocab);
        tracing::info!(entities = entities.len(), triples = graph.len(), "snapshot built");
        Ok(graph)
    }

    /// Parses a mapping table.
    ///
    /// # Errors
    /// Returns [`crate::error::MappingError`] if the input cannot be decoded.
    pub fn parse_mapping<R: Read>(&self, input: R) -> ProvResult<MappingTable> {
        Ok(self.parser.parse_reader(input)?)
    }

    /// Merges a parsed table against the source graph's labels.
    #[must_use]
    pub fn merge(&self, source_graph: &Graph, table: &MappingTable) -> MergeOutcome {
        let index = LabelIndex::from_graph(source_graph);
        self.engine.merge(&index, &table.pairs())
    }

    /// Extracts facts from a merged graph and swaps them in for serving.
    ///
    /// # Errors
    /// Returns [`crate::error::RetrievalError`] if the index cannot be built.
    pub fn load_facts(&self, merged: &Graph) -> ProvResult<usize> {
        let facts = provenance_facts(merged);
        let start = Instant::now();
        let n = self.retrieval.rebuild_from_facts(&facts)?;
        tracing::info!(facts = n, elapsed_ms = start.elapsed().as_millis(), "facts loaded");
        Ok(n)
    }

    /// Runs parse, merge and fact loading. Returns the merged graph.
    ///
    /// # Errors
    /// Fails only on unreadable mapping input or an index build failure.
    pub fn run<R: Read>(&self, source_graph: &Graph, mapping: R) -> ProvResult<(Graph, PipelineReport)> {
        let table = self.parse_mapping(mapping)?;
        let MergeOutcome { graph, report } = self.merge(source_graph, &table);
        let facts = self.load_facts(&graph)?;
        Ok((
            graph,
            PipelineReport {
                parse: table.report,
                merge: report,
                facts,
            },
        ))
    }

    /// Currently served facts, in fact order.
    ///
    /// # Errors
    /// Returns [`crate::error::RetrievalError::Poisoned`] if a loader panicked.
    pub fn facts(&self) -> ProvResult<Vec<ProvenanceFact>> {
        let snapshot = self.retrieval.snapshot()?;
        Ok(snapshot
            .documents()
            .iter()
            .filter_map(|d| d.record.clone())
            .collect())
    }

    /// Top-k facts for `query`.
    ///
    /// # Errors
    /// See [`crate::retrieval::RetrievalIndex::search`].
    pub fn search(&self, query: &str, k: usize) -> ProvResult<Vec<SearchHit>> {
        Ok(self.retrieval.search(query, k)?)
    }

    fn all_fact_hits(&self) -> ProvResult<Vec<SearchHit>> {
        let snapshot = self.retrieval.snapshot()?;
        Ok(snapshot
            .documents()
            .iter()
            .enumerate()
            .map(|(i, d)| SearchHit {
                rank: i,
                index: i,
                fact: d.text.clone(),
                score: 1.0,
                record: d.record.clone(),
            })
            .collect())
    }

    /// Answers `question` from the loaded facts.
    ///
    /// # Errors
    /// Fails only if the context cannot be read; generation never fails.
    pub fn ask(&self, question: &str, mode: ContextMode) -> ProvResult<AskResponse> {
        let context = match mode {
            ContextMode::Retrieval { k } => self.search(question, k)?,
            ContextMode::AllFacts => self.all_fact_hits()?,
        };
        tracing::debug!(context = context.len(), ?mode, "answering");
        let answer = self.generator.generate(question, &context);
        Ok(AskResponse {
            question: question.to_string(),
            answer,
            context,
        })
    }
}

fn embedder_for(config: &Config) -> ProvResult<Arc<dyn Embedder>> {
    match config.embedder {
        EmbedderKind::Lexical => Ok(Arc::new(LexicalEmbedder::new(config.embedding_dim)?)),
        #[cfg(feature = "fastembed")]
        EmbedderKind::FastEmbed => Ok(Arc::new(FastEmbedEmbedder::new()?)),
        #[cfg(not(feature = "fastembed"))]
        EmbedderKind::FastEmbed => Err(crate::error::ConfigError::InvalidValue {
            key: crate::config::env::EMBEDDER.to_string(),
            value: config.embedder.to_string(),
            reason: "built without the `fastembed` feature".to_string(),
        }
        .into()),
    }
}
