//! # provkg - Administrative-Region Provenance Knowledge Graph
//!
//! provkg reconciles a table of administrative-region mergers against the
//! entities of an external knowledge graph, emits a provenance graph linking
//! each successor region to the regions it was formed from, and serves
//! semantic retrieval and question answering over the resulting facts.
//!
//! ## Core Concepts
//!
//! - **Label index**: normalized label to entity identifier, first seen wins
//! - **Mapping table**: rows of `new_province` / `old_province` labels, the old
//!   cell holding several `|`-separated labels
//! - **Merge engine**: resolves both sides, mints identifiers for unknown
//!   successors, skips unknown predecessors, emits `formedBy` / `mergedInto`
//! - **Retrieval index**: embedded fact strings searched by cosine similarity
//!
//! ## Usage
//!
//! ```rust
//! use provkg::entity::{EntityId, LabelIndex};
//! use provkg::mapping::MappingParser;
//! use provkg::merge::MergeEngine;
//! use provkg::facts::provenance_facts;
//!
//! let index = LabelIndex::build(vec![
//!     (EntityId::new("http://dbpedia.org/resource/Quang_Nam"), "Quang Nam"),
//! ]);
//! let table = MappingParser::new()
//!     .parse_reader("new_province,old_province\nĐà Nẵng,Quang Nam\n".as_bytes())?;
//!
//! let outcome = MergeEngine::default().merge(&index, &table.pairs());
//! assert_eq!(outcome.report.pairs_linked, 1);
//!
//! let facts = provenance_facts(&outcome.graph);
//! assert_eq!(facts[0].new_label, "Đà Nẵng");
//! # Ok::<(), provkg::error::MappingError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::module_inception)]

// Graph and identity
pub mod entity;
pub mod error;
pub mod graph;

// Merge path
pub mod mapping;
pub mod merge;
pub mod source;

// Query path
pub mod answer;
pub mod embedding;
pub mod facts;
pub mod retrieval;

// Composition
pub mod config;
pub mod pipeline;

// Re-export primary types at crate root for convenience
pub use answer::{Answer, AnswerGenerator, AnswerProvider, FallbackGenerator, GeminiGenerator, TieredGenerator};
pub use config::{Config, EmbedderKind};
pub use embedding::{Embedder, LexicalEmbedder};
#[cfg(feature = "fastembed")]
pub use embedding::FastEmbedEmbedder;
pub use entity::{EntityId, LabelIndex, LabeledEntity};
pub use error::{AnswerError, ConfigError, FetchError, GraphError, MappingError, ProvError, ProvResult, RetrievalError};
pub use facts::{provenance_facts, ProvenanceFact};
pub use graph::{Graph, Predicate, Term, Triple, Vocabulary};
pub use mapping::{MappingPair, MappingParser, MappingTable, RowOutcome};
pub use merge::{MergeEngine, MergeOutcome, MergeReport, PairOutcome};
pub use pipeline::{AskResponse, ContextMode, Pipeline, PipelineReport};
pub use retrieval::{RetrievalIndex, SearchHit, SharedRetrievalIndex};
pub use source::{EntitySource, SparqlSource, StaticSource};
