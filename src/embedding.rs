//! Embedding providers.
//!
//! The retrieval index takes an [`Embedder`] explicitly; one instance is
//! built at startup and shared read-only by index builds and queries.
//!
//! [`LexicalEmbedder`] is deterministic, offline, and dependency-free beyond
//! `blake3`. It is *not* a neural embedding model: it feature-hashes tokens
//! into a fixed number of signed buckets. That is enough for top-k retrieval
//! over short fact strings, and it keeps tests reproducible.
//!
//! With the `fastembed` feature, `FastEmbedEmbedder` runs the
//! `all-MiniLM-L6-v2` sentence model locally through ONNX Runtime.

#[cfg(feature = "fastembed")]
use std::sync::Mutex;

use blake3::Hasher;
#[cfg(feature = "fastembed")]
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use crate::entity::fold_diacritics;
use crate::error::RetrievalError;

/// Default embedding dimensionality for lexical embeddings.
///
/// Keep this modest to control memory usage.
pub const DEFAULT_EMBEDDING_DIM: usize = 64;

/// Maps text to fixed-dimensionality vectors.
pub trait Embedder: Send + Sync {
    /// Output dimensionality. Never zero.
    fn dimension(&self) -> usize;

    /// Embeds one text.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Embedding`] if the model fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;

    /// Embeds many texts, one vector per text. Implementations may batch.
    ///
    /// # Errors
    /// See [`Embedder::embed`].
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty())
}

fn bucket_and_sign(token: &str, dim: usize) -> (usize, f32) {
    let mut h = Hasher::new();
    h.update(token.as_bytes());
    let hash = h.finalize();
    let bytes = hash.as_bytes();

    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    let bucket = u64::from_le_bytes(raw);

    #[allow(clippy::cast_possible_truncation)]
    let idx = (bucket % dim as u64) as usize;
    let sign = if (bytes[8] & 1) == 0 { 1.0f32 } else { -1.0f32 };
    (idx, sign)
}

/// Scales `vec` to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm2: f64 = vec.iter().map(|&x| f64::from(x) * f64::from(x)).sum();
    if norm2 > 0.0 && norm2.is_finite() {
        #[allow(clippy::cast_possible_truncation)]
        let inv = norm2.sqrt().recip() as f32;
        for x in vec.iter_mut() {
            *x *= inv;
        }
    }
}

/// Create a deterministic lexical embedding with a custom dimension.
///
/// Tokens are lowercased and diacritic-folded, so `Đà Nẵng` and `da nang`
/// land in the same buckets.
#[must_use]
pub fn lexical_embedding_with_dim(text: &str, dim: usize) -> Vec<f32> {
    if dim == 0 {
        return Vec::new();
    }

    let mut vec = vec![0.0f32; dim];
    let folded = fold_diacritics(&text.to_lowercase());
    let mut count = 0u32;
    for token in tokenize(&folded) {
        let (idx, sign) = bucket_and_sign(token, dim);
        vec[idx] += sign;
        count = count.saturating_add(1);
    }

    if count > 0 {
        l2_normalize(&mut vec);
    }
    vec
}

/// Create a deterministic lexical embedding at [`DEFAULT_EMBEDDING_DIM`].
#[must_use]
pub fn lexical_embedding(text: &str) -> Vec<f32> {
    lexical_embedding_with_dim(text, DEFAULT_EMBEDDING_DIM)
}

/// Feature-hashing embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexicalEmbedder {
    dim: usize,
}

impl LexicalEmbedder {
    /// Creates an embedder with the given dimensionality.
    ///
    /// # Errors
    /// Returns [`RetrievalError::ZeroDimension`] if `dim` is zero.
    pub fn new(dim: usize) -> Result<Self, RetrievalError> {
        if dim == 0 {
            return Err(RetrievalError::ZeroDimension);
        }
        Ok(Self { dim })
    }
}

impl Default for LexicalEmbedder {
    fn default() -> Self {
        Self {
            dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl Embedder for LexicalEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(lexical_embedding_with_dim(text, self.dim))
    }
}

/// Output dimensionality of `all-MiniLM-L6-v2`.
#[cfg(feature = "fastembed")]
pub const MINILM_EMBEDDING_DIM: usize = 384;

/// Local sentence-transformer embedder (`all-MiniLM-L6-v2`).
///
/// The model is downloaded to the cache directory on first use. Inference
/// takes `&mut` on the session, so calls are serialized behind a mutex.
#[cfg(feature = "fastembed")]
pub struct FastEmbedEmbedder {
    model: Mutex<TextEmbedding>,
    batch_size: Option<usize>,
}

#[cfg(feature = "fastembed")]
impl std::fmt::Debug for FastEmbedEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedEmbedder")
            .field("model", &"all-MiniLM-L6-v2")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "fastembed")]
impl FastEmbedEmbedder {
    /// Loads the model, downloading it if it is not cached.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Embedding`] if the model cannot be fetched
    /// or the runtime cannot start.
    pub fn new() -> Result<Self, RetrievalError> {
        let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        let model = TextEmbedding::try_new(options).map_err(|e| RetrievalError::Embedding {
            message: e.to_string(),
        })?;
        tracing::info!(model = "all-MiniLM-L6-v2", dimension = MINILM_EMBEDDING_DIM, "loaded embedding model");
        Ok(Self {
            model: Mutex::new(model),
            batch_size: None,
        })
    }

    /// Sets the inference batch size. `None` uses the library default.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }

    fn run(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut model = self
            .model
            .lock()
            .map_err(|_| RetrievalError::Poisoned { context: "embedding.model" })?;
        model
            .embed(texts, self.batch_size)
            .map_err(|e| RetrievalError::Embedding {
                message: e.to_string(),
            })
    }
}

#[cfg(feature = "fastembed")]
impl Embedder for FastEmbedEmbedder {
    fn dimension(&self) -> usize {
        MINILM_EMBEDDING_DIM
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut out = self.run(&[text.to_string()])?;
        out.pop().ok_or_else(|| RetrievalError::BatchSizeMismatch {
            actual: 0,
            expected: 1,
        })
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.run(texts)
    }
}
