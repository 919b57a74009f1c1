//! Concurrently readable retrieval handle with whole-index swaps.

use std::sync::{Arc, PoisonError, RwLock};

use super::{RetrievalIndex, SearchHit};
use crate::embedding::Embedder;
use crate::error::RetrievalError;
use crate::facts::ProvenanceFact;

fn lock_err<T>(context: &'static str) -> impl FnOnce(PoisonError<T>) -> RetrievalError {
    move |_| RetrievalError::Poisoned { context }
}

/// Readers take an `Arc` snapshot; a rebuild constructs a fresh index off
/// the lock and swaps it in. Readers never see a partially built index.
pub struct SharedRetrievalIndex {
    embedder: Arc<dyn Embedder>,
    current: RwLock<Arc<RetrievalIndex>>,
}

impl std::fmt::Debug for SharedRetrievalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRetrievalIndex")
            .field("dimension", &self.embedder.dimension())
            .finish_non_exhaustive()
    }
}

impl SharedRetrievalIndex {
    /// Starts with an unbuilt index.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        let empty = Arc::new(RetrievalIndex::empty(Arc::clone(&embedder)));
        Self {
            embedder,
            current: RwLock::new(empty),
        }
    }

    /// Wraps an already-built index.
    #[must_use]
    pub fn from_index(index: RetrievalIndex) -> Self {
        let embedder = Arc::clone(index.embedder());
        Self {
            embedder,
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// The index currently being served.
    ///
    /// # Errors
    /// Returns [`RetrievalError::Poisoned`] if a writer panicked.
    pub fn snapshot(&self) -> Result<Arc<RetrievalIndex>, RetrievalError> {
        let guard = self.current.read().map_err(lock_err("retrieval.read"))?;
        Ok(Arc::clone(&guard))
    }

    /// Builds a new index over `facts` and swaps it in. Returns its size.
    ///
    /// On error the previous index keeps serving.
    ///
    /// # Errors
    /// Propagates build errors, or [`RetrievalError::Poisoned`].
    pub fn rebuild(&self, facts: Vec<String>) -> Result<usize, RetrievalError> {
        let next = RetrievalIndex::build(Arc::clone(&self.embedder), facts)?;
        self.swap(next)
    }

    /// Like [`SharedRetrievalIndex::rebuild`], keeping fact records.
    ///
    /// # Errors
    /// Propagates build errors, or [`RetrievalError::Poisoned`].
    pub fn rebuild_from_facts(&self, facts: &[ProvenanceFact]) -> Result<usize, RetrievalError> {
        let next = RetrievalIndex::build_from_facts(Arc::clone(&self.embedder), facts)?;
        self.swap(next)
    }

    fn swap(&self, next: RetrievalIndex) -> Result<usize, RetrievalError> {
        let len = next.len();
        let mut guard = self.current.write().map_err(lock_err("retrieval.write"))?;
        *guard = Arc::new(next);
        tracing::debug!(documents = len, "swapped retrieval index");
        Ok(len)
    }

    /// Searches the current snapshot.
    ///
    /// # Errors
    /// See [`RetrievalIndex::search`].
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, RetrievalError> {
        self.snapshot()?.search(query, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::LexicalEmbedder;
    use std::thread;

    fn shared() -> SharedRetrievalIndex {
        SharedRetrievalIndex::new(Arc::new(LexicalEmbedder::default()))
    }

    #[test]
    fn test_starts_empty() {
        let s = shared();
        assert!(s.search("Hue", 3).unwrap().is_empty());
        assert!(s.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_rebuild_swaps_whole_index() {
        let s = shared();
        assert_eq!(s.rebuild(vec!["Hue".into(), "Hanoi".into()]).unwrap(), 2);
        let old = s.snapshot().unwrap();

        assert_eq!(s.rebuild(vec!["Can Tho".into()]).unwrap(), 1);
        assert_eq!(old.len(), 2);
        assert_eq!(s.snapshot().unwrap().len(), 1);
        assert_eq!(s.search("Can Tho", 5).unwrap()[0].fact, "Can Tho");
    }

    #[test]
    fn test_concurrent_readers_during_rebuild() {
        let s = Arc::new(shared());
        s.rebuild(vec!["a b".into(), "c d".into()]).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let s = Arc::clone(&s);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let n = s.search("a", 10).unwrap().len();
                        assert!(n == 2 || n == 3);
                    }
                })
            })
            .collect();
        s.rebuild(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }

    #[test]
    fn test_from_index() {
        let index = RetrievalIndex::build(
            Arc::new(LexicalEmbedder::default()),
            vec!["Quang Nam".into()],
        )
        .unwrap();
        let s = SharedRetrievalIndex::from_index(index);
        assert_eq!(s.search("quang nam", 1).unwrap().len(), 1);
    }
}
