//! Exact inner-product vector store.
//!
//! Behaves like a flat similarity backend: brute-force scoring over every
//! stored vector, results padded with the sentinel index `-1` when more
//! neighbours are requested than are stored.

use crate::error::RetrievalError;

/// Index value returned for padding slots.
pub const NO_MATCH: i64 = -1;

/// Row-major store of equal-length vectors.
#[derive(Debug, Clone)]
pub struct FlatInnerProductIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatInnerProductIndex {
    /// Creates an empty store for `dim`-dimensional vectors.
    ///
    /// # Errors
    /// Returns [`RetrievalError::ZeroDimension`] if `dim` is zero.
    pub fn new(dim: usize) -> Result<Self, RetrievalError> {
        if dim == 0 {
            return Err(RetrievalError::ZeroDimension);
        }
        Ok(Self {
            dim,
            data: Vec::new(),
        })
    }

    /// Vector dimensionality.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dim
    }

    /// Number of stored vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check_dim(&self, actual: usize) -> Result<(), RetrievalError> {
        if actual == self.dim {
            Ok(())
        } else {
            Err(RetrievalError::DimensionMismatch {
                actual,
                expected: self.dim,
            })
        }
    }

    /// Appends a vector; its position is the next insertion index.
    ///
    /// # Errors
    /// Returns [`RetrievalError::DimensionMismatch`] for a wrong-length vector.
    pub fn add(&mut self, vector: &[f32]) -> Result<(), RetrievalError> {
        self.check_dim(vector.len())?;
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Returns the stored vector at `idx`.
    #[must_use]
    pub fn vector(&self, idx: usize) -> Option<&[f32]> {
        let start = idx.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    /// Returns exactly `k` `(index, score)` slots, best first.
    ///
    /// Equal scores keep insertion order. Slots beyond the stored count are
    /// `(NO_MATCH, f32::NEG_INFINITY)`.
    ///
    /// # Errors
    /// Returns [`RetrievalError::DimensionMismatch`] for a wrong-length query.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(i64, f32)>, RetrievalError> {
        self.check_dim(query.len())?;

        let mut scored: Vec<(i64, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, row)| {
                let dot: f32 = row.iter().zip(query).map(|(a, b)| a * b).sum();
                #[allow(clippy::cast_possible_wrap)]
                (i as i64, if dot.is_finite() { dot } else { 0.0 })
            })
            .collect();

        // Stable: ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored.resize(k, (NO_MATCH, f32::NEG_INFINITY));
        Ok(scored)
    }
}
