//! Inverted word index (C3).
//!
//! A term→postings store, append-mostly with differential score updates,
//! backing the conjunctive `fts:match`/`tracker:match` side of SPARQL
//! queries. The on-disk format lives in `store`; this module is the public
//! surface `Engine` and the C5 update executor call into.

mod posting;
mod store;

use std::path::Path;

pub use posting::Posting;
pub use store::{IndexError, IndexTuning};

use store::InvertedIndexStore;

/// A ranked hit: a service (subject) id plus its summed score across the
/// queried terms, in the caller's requested type range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHit {
    pub service_id: u32,
    pub service_type: u8,
    pub score: u16,
}

impl From<Posting> for IndexHit {
    fn from(p: Posting) -> Self {
        IndexHit {
            service_id: p.service_id,
            service_type: p.service_type(),
            score: p.score(),
        }
    }
}

/// Handle onto the on-disk posting store. One instance is opened per
/// index file and shared (behind `Arc`, by the caller) across threads: all
/// writes already serialise through the store's internal mutex.
pub struct InvertedIndex {
    store: InvertedIndexStore,
}

impl InvertedIndex {
    pub fn open(path: &Path, tuning: IndexTuning) -> Result<Self, IndexError> {
        Ok(InvertedIndex {
            store: InvertedIndexStore::open(path, tuning)?,
        })
    }

    /// Bulk-append: service is newly indexed and has no prior postings for
    /// any of `terms`, so each occurrence is a pure addition.
    pub fn append_chunk(
        &self,
        terms: &std::collections::HashMap<String, u32>,
        service_id: u32,
        service_type: u8,
    ) -> Result<(), IndexError> {
        for (term, count) in terms {
            let score = (*count).min(u16::MAX as u32) as u16;
            self.store.append_one(term, service_id, service_type, score)?;
        }
        Ok(())
    }

    pub fn append_one(
        &self,
        term: &str,
        service_id: u32,
        service_type: u8,
        score: u16,
    ) -> Result<(), IndexError> {
        self.store.append_one(term, service_id, service_type, score)
    }

    /// Apply one differential score delta (spec §4.3's Update operation).
    /// `remove = true` forces the posting out regardless of the resulting
    /// score, used when a property value is deleted outright.
    pub fn update(
        &self,
        term: &str,
        service_id: u32,
        service_type: u8,
        score_delta: i32,
        remove: bool,
    ) -> Result<(), IndexError> {
        self.store.update(term, service_id, service_type, score_delta, remove)
    }

    /// Apply a full old→new term-count diff for one service: terms only in
    /// `old` are removed, terms only in `new` are added, terms in both get
    /// their score delta applied. This is the core of differential
    /// indexing (spec §4.3, §5 C5).
    pub fn apply_diff(
        &self,
        old_terms: &std::collections::HashMap<String, u32>,
        new_terms: &std::collections::HashMap<String, u32>,
        service_id: u32,
        service_type: u8,
    ) -> Result<(), IndexError> {
        for (term, old_count) in old_terms {
            let new_count = new_terms.get(term).copied().unwrap_or(0);
            if new_count == 0 {
                self.update(term, service_id, service_type, -(*old_count as i32), true)?;
            }
        }
        for (term, new_count) in new_terms {
            let old_count = old_terms.get(term).copied().unwrap_or(0);
            let delta = *new_count as i32 - old_count as i32;
            if delta != 0 {
                self.update(term, service_id, service_type, delta, false)?;
            }
        }
        Ok(())
    }

    /// Drop every posting for `service_id` across `terms` (full service
    /// deletion).
    pub fn remove_service(
        &self,
        terms: &std::collections::HashMap<String, u32>,
        service_id: u32,
        service_type: u8,
    ) -> Result<(), IndexError> {
        for term in terms.keys() {
            self.update(term, service_id, service_type, 0, true)?;
        }
        Ok(())
    }

    pub fn read_single_term(
        &self,
        word: &str,
        stype_min: u8,
        stype_max: u8,
        offset: usize,
        limit: usize,
        want_count: bool,
    ) -> Result<(Vec<IndexHit>, usize), IndexError> {
        let (postings, total) = self
            .store
            .read_single_term(word, stype_min, stype_max, offset, limit, want_count)?;
        Ok((postings.into_iter().map(IndexHit::from).collect(), total))
    }

    pub fn read_multi_term(
        &self,
        words: &[String],
        stype_min: u8,
        stype_max: u8,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<IndexHit>, IndexError> {
        let postings = self
            .store
            .read_multi_term(words, stype_min, stype_max, offset, limit)?;
        Ok(postings.into_iter().map(IndexHit::from).collect())
    }

    pub fn optimize(&self) -> Result<(), IndexError> {
        self.store.optimize()
    }

    pub fn bucket_count(&self) -> u32 {
        self.store.bucket_count()
    }

    pub fn record_count(&self) -> u32 {
        self.store.record_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn index() -> (InvertedIndex, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("word-index.db");
        let idx = InvertedIndex::open(&path, IndexTuning::default()).unwrap();
        (idx, dir)
    }

    #[test]
    fn apply_diff_adds_removes_and_adjusts() {
        let (idx, _dir) = index();
        let mut old = HashMap::new();
        old.insert("keep".to_string(), 2u32);
        old.insert("drop".to_string(), 1u32);
        idx.append_chunk(&old, 1, 1).unwrap();

        let mut new = HashMap::new();
        new.insert("keep".to_string(), 5u32); // delta +3
        new.insert("added".to_string(), 4u32); // new term
        idx.apply_diff(&old, &new, 1, 1).unwrap();

        let (hits, _) = idx.read_single_term("keep", 0, 255, 0, 10, false).unwrap();
        assert_eq!(hits[0].score, 5);

        let (hits, _) = idx.read_single_term("drop", 0, 255, 0, 10, false).unwrap();
        assert!(hits.is_empty());

        let (hits, _) = idx.read_single_term("added", 0, 255, 0, 10, false).unwrap();
        assert_eq!(hits[0].score, 4);
    }

    #[test]
    fn remove_service_clears_all_terms() {
        let (idx, _dir) = index();
        let mut terms = HashMap::new();
        terms.insert("alpha".to_string(), 3u32);
        terms.insert("beta".to_string(), 2u32);
        idx.append_chunk(&terms, 7, 1).unwrap();
        idx.remove_service(&terms, 7, 1).unwrap();

        let (hits, _) = idx.read_single_term("alpha", 0, 255, 0, 10, false).unwrap();
        assert!(hits.is_empty());
    }
}
