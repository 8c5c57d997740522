use crate::error::IndexError;
use crate::tokenizer::TokenizerConfig;
use serde::{Deserialize, Serialize};

pub type TermId = u32;
pub type DocId = u32;

/// A content record as handed over by the site build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub url: String,
    pub teaser: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMeta {
    pub external_id: String,
    pub title: String,
    pub url: String,
    /// Markup-stripped, truncated excerpt used for snippets.
    pub excerpt: String,
    pub teaser: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32, // normalized tf-idf weight
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: String,
    pub df: u32,
    pub idf: f32,
    pub postings: Vec<Posting>, // sorted by doc_id
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdfMode {
    /// ln(1 + N/df)
    #[default]
    Smoothed,
    /// ln(N/df)
    Raw,
}

impl IdfMode {
    pub fn idf(self, num_docs: u32, df: u32) -> f32 {
        let n = num_docs.max(1) as f32;
        let df = df.max(1) as f32;
        match self {
            IdfMode::Smoothed => (1.0 + n / df).ln(),
            IdfMode::Raw => (n / df).ln(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexHeader {
    pub tokenizer: TokenizerConfig,
    pub idf: IdfMode,
    /// RFC 3339; only set when the caller pins a build time.
    pub built_at: Option<String>,
}

/// The whole searchable artifact. Terms are sorted, docs are in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub header: IndexHeader,
    pub terms: Vec<TermEntry>,
    pub docs: Vec<DocMeta>,
}

impl SearchIndex {
    pub fn num_docs(&self) -> u32 {
        self.docs.len() as u32
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn num_postings(&self) -> usize {
        self.terms.iter().map(|t| t.postings.len()).sum()
    }

    pub fn term_id(&self, term: &str) -> Option<TermId> {
        self.terms
            .binary_search_by(|e| e.term.as_str().cmp(term))
            .ok()
            .map(|i| i as TermId)
    }

    pub fn term(&self, id: TermId) -> Option<&TermEntry> {
        self.terms.get(id as usize)
    }

    pub fn doc(&self, id: DocId) -> Option<&DocMeta> {
        self.docs.get(id as usize)
    }

    pub fn doc_id_for(&self, external_id: &str) -> Option<DocId> {
        self.docs
            .iter()
            .position(|d| d.external_id == external_id)
            .map(|i| i as DocId)
    }

    /// Check the structural invariants every reader relies on.
    pub fn validate(&self) -> Result<(), IndexError> {
        let num_docs = self.num_docs();
        for pair in self.terms.windows(2) {
            if pair[0].term >= pair[1].term {
                return Err(IndexError::Corrupt(format!(
                    "dictionary not sorted at {:?}",
                    pair[1].term
                )));
            }
        }
        for entry in &self.terms {
            if entry.postings.is_empty() {
                return Err(IndexError::Corrupt(format!("term {:?} has no postings", entry.term)));
            }
            if entry.df as usize != entry.postings.len() {
                return Err(IndexError::Corrupt(format!(
                    "term {:?}: df {} != {} postings",
                    entry.term,
                    entry.df,
                    entry.postings.len()
                )));
            }
            let mut prev: Option<DocId> = None;
            for p in &entry.postings {
                if p.doc_id >= num_docs {
                    return Err(IndexError::Corrupt(format!(
                        "term {:?} references missing doc {}",
                        entry.term, p.doc_id
                    )));
                }
                if prev.is_some_and(|d| d >= p.doc_id) {
                    return Err(IndexError::Corrupt(format!(
                        "postings for {:?} not strictly ascending",
                        entry.term
                    )));
                }
                prev = Some(p.doc_id);
            }
        }
        Ok(())
    }
}
