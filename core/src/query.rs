//! Read-only query side of the index.
//!
//! `QueryEngine` owns an immutable [`SearchIndex`] and is shared across
//! threads behind an `Arc`. Scores are cosine similarities between the query
//! vector and the pre-normalized document vectors stored in the postings.

use crate::index::{DocId, SearchIndex, TermId};
use crate::snippet;
use crate::tokenizer::Tokenizer;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

pub const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f32,
}

impl Eq for ScoredDoc {}

impl Ord for ScoredDoc {
    /// Greater means ranked earlier: higher score, then lower doc id.
    fn cmp(&self, other: &Self) -> Ordering {
        self.score.total_cmp(&other.score).then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Ranked matches of one query, produced best-first on demand.
///
/// Only the heap is built up front; ordering work happens as the caller pulls.
/// Cloning gives an independent iterator starting from the current position.
#[derive(Debug, Clone)]
pub struct Hits {
    heap: BinaryHeap<ScoredDoc>,
    total: usize,
    partial: bool,
}

impl Hits {
    fn empty() -> Self {
        Self { heap: BinaryHeap::new(), total: 0, partial: false }
    }

    /// Number of matching documents, regardless of how many were consumed.
    pub fn total(&self) -> usize {
        self.total
    }

    /// True when a deadline cut score accumulation short.
    pub fn is_partial(&self) -> bool {
        self.partial
    }
}

impl Iterator for Hits {
    type Item = ScoredDoc;

    fn next(&mut self) -> Option<ScoredDoc> {
        self.heap.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.heap.len(), Some(self.heap.len()))
    }
}

impl ExactSizeIterator for Hits {}

/// A rendered result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub doc_id: DocId,
    pub id: String,
    pub score: f32,
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct QueryEngine {
    index: SearchIndex,
    tokenizer: Tokenizer,
}

impl QueryEngine {
    pub fn new(index: SearchIndex) -> Self {
        let tokenizer = Tokenizer::new(index.header.tokenizer);
        Self { index, tokenizer }
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    pub fn search(&self, query: &str) -> Hits {
        self.rank(query, None)
    }

    /// Like [`search`](Self::search) but stops accumulating once `deadline`
    /// passes; whatever was scored so far is returned and marked partial.
    pub fn search_with_deadline(&self, query: &str, deadline: Instant) -> Hits {
        self.rank(query, Some(deadline))
    }

    /// Query text of unknown encoding. Invalid sequences decode to U+FFFD,
    /// which never forms a token.
    pub fn search_bytes(&self, query: &[u8]) -> Hits {
        self.search(&String::from_utf8_lossy(query))
    }

    /// The best `limit` results rendered for display.
    pub fn top(&self, query: &str, limit: usize) -> Vec<Hit> {
        let raw_terms = raw_terms(query);
        self.search(query).take(limit).filter_map(|s| self.render(s, &raw_terms)).collect()
    }

    pub fn render(&self, scored: ScoredDoc, raw_terms: &[String]) -> Option<Hit> {
        let meta = self.index.doc(scored.doc_id)?;
        Some(Hit {
            doc_id: scored.doc_id,
            id: meta.external_id.clone(),
            score: scored.score,
            title: meta.title.clone(),
            url: meta.url.clone(),
            snippet: snippet::snippet(&meta.excerpt, raw_terms, SNIPPET_CHARS),
        })
    }

    fn query_weights(&self, query: &str) -> Vec<(TermId, f32)> {
        let mut tf_q_raw: HashMap<TermId, u32> = HashMap::new();
        for term in self.tokenizer.terms(query) {
            if let Some(tid) = self.index.term_id(&term) {
                *tf_q_raw.entry(tid).or_insert(0) += 1;
            }
        }
        let mut q_weights: Vec<(TermId, f32)> = tf_q_raw
            .into_iter()
            .map(|(tid, tf_raw)| {
                let tf = 1.0 + (tf_raw as f32).ln();
                let idf = self.index.term(tid).map_or(0.0, |t| t.idf);
                (tid, tf * idf)
            })
            .collect();
        q_weights.sort_by_key(|(tid, _)| *tid);
        let mut norm = q_weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm == 0.0 { norm = 1.0; }
        for (_, w) in q_weights.iter_mut() { *w /= norm; }
        q_weights
    }

    fn rank(&self, query: &str, deadline: Option<Instant>) -> Hits {
        let q_weights = self.query_weights(query);
        if q_weights.is_empty() {
            return Hits::empty();
        }

        let mut scores: HashMap<DocId, f32> = HashMap::new();
        let mut partial = false;
        for (tid, q_w) in &q_weights {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                partial = true;
                break;
            }
            let Some(entry) = self.index.term(*tid) else { continue };
            for p in &entry.postings {
                *scores.entry(p.doc_id).or_insert(0.0) += p.weight * q_w;
            }
        }
        if partial {
            tracing::debug!(query, scored = scores.len(), "deadline reached, returning partial ranking");
        }

        let heap: BinaryHeap<ScoredDoc> = scores.into_iter().map(|(doc_id, score)| ScoredDoc { doc_id, score }).collect();
        Hits { total: heap.len(), heap, partial }
    }
}

/// Whitespace-separated words of the query as typed, for snippets.
pub fn raw_terms(query: &str) -> Vec<String> {
    query.split_whitespace().map(|s| s.to_string()).collect()
}
