//! Offline index construction.
//!
//! Documents get dense ids in input order. Each field contributes its weight
//! per token occurrence; the weighted frequency is log-scaled, multiplied by
//! idf and L2-normalized per document so that query scoring is a dot product.
//! Every accumulator is ordered (term map is a `BTreeMap`, postings are pushed
//! in doc order) which makes the output reproducible byte for byte.

use crate::error::{BuildError, RecordError};
use crate::index::{DocId, DocMeta, Document, IdfMode, IndexHeader, Posting, SearchIndex, TermEntry};
use crate::snippet::clean_excerpt;
use crate::tokenizer::{Tokenizer, TokenizerConfig};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldWeights {
    pub title: f32,
    pub categories: f32,
    pub tags: f32,
    pub excerpt: f32,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self { title: 3.0, categories: 2.0, tags: 2.0, excerpt: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildConfig {
    pub tokenizer: TokenizerConfig,
    pub idf: IdfMode,
    pub weights: FieldWeights,
    pub excerpt_chars: usize,
    pub built_at: Option<String>,
}

impl BuildConfig {
    /// Pin the build timestamp (unix seconds), e.g. from `SOURCE_DATE_EPOCH`.
    /// Out-of-range values leave it unset.
    pub fn with_build_time(mut self, unix_secs: i64) -> Self {
        self.built_at = time::OffsetDateTime::from_unix_timestamp(unix_secs)
            .ok()
            .and_then(|t| t.format(&time::format_description::well_known::Rfc3339).ok());
        self
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerConfig::default(),
            idf: IdfMode::default(),
            weights: FieldWeights::default(),
            excerpt_chars: 300,
            built_at: None,
        }
    }
}

/// What happened during a successful build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub documents: usize,
    pub terms: usize,
    pub postings: usize,
    /// Ids of documents stored without a single indexable token.
    pub unsearchable: Vec<String>,
    /// Ids of documents whose non-empty title yields no token, e.g. a title
    /// made only of stopwords. No title word will find them.
    pub untitled: Vec<String>,
}

pub struct IndexBuilder {
    config: BuildConfig,
    tokenizer: Tokenizer,
}

impl IndexBuilder {
    pub fn new(config: BuildConfig) -> Self {
        let tokenizer = Tokenizer::new(config.tokenizer);
        Self { config, tokenizer }
    }

    /// Build an index from `docs`. Either every document is indexed or the
    /// whole batch is rejected.
    pub fn build<I>(&self, docs: I) -> Result<(SearchIndex, BuildReport), BuildError>
    where
        I: IntoIterator<Item = Document>,
    {
        let docs: Vec<Document> = docs.into_iter().collect();
        validate(&docs)?;

        let num_docs = docs.len() as u32;
        // term -> postings of (doc_id, weighted tf), doc ids ascending
        let mut postings_raw: BTreeMap<String, Vec<(DocId, f32)>> = BTreeMap::new();
        let mut metas: Vec<DocMeta> = Vec::with_capacity(docs.len());
        let mut unsearchable = Vec::new();
        let mut untitled = Vec::new();

        for (i, doc) in docs.into_iter().enumerate() {
            let doc_id = i as DocId;
            let tf = self.weighted_tf(&doc);
            if tf.is_empty() {
                tracing::warn!(id = %doc.id, url = %doc.url, "document has no indexable tokens");
                unsearchable.push(doc.id.clone());
            } else if !doc.title.trim().is_empty() && self.tokenizer.tokenize(&doc.title).is_empty() {
                tracing::warn!(id = %doc.id, title = %doc.title, "title has no indexable tokens");
                untitled.push(doc.id.clone());
            }
            for (term, w) in tf {
                postings_raw.entry(term).or_default().push((doc_id, w));
            }
            metas.push(DocMeta {
                excerpt: clean_excerpt(&doc.excerpt, self.config.excerpt_chars),
                external_id: doc.id,
                title: doc.title,
                url: doc.url,
                teaser: doc.teaser,
                categories: doc.categories,
                tags: doc.tags,
            });
        }
        tracing::info!(num_docs, num_terms = postings_raw.len(), "tokenized documents");

        // First pass: tf-idf per posting, accumulate squared norms
        let mut doc_norms: Vec<f32> = vec![0.0; num_docs as usize];
        let mut weighted: Vec<(String, f32, Vec<(DocId, f32)>)> = Vec::with_capacity(postings_raw.len());
        for (term, plist) in postings_raw {
            let idf = self.config.idf.idf(num_docs, plist.len() as u32);
            let plist: Vec<(DocId, f32)> = plist
                .into_iter()
                .map(|(doc_id, wtf)| {
                    let tf = if wtf > 0.0 { 1.0 + wtf.ln() } else { 0.0 };
                    let tfidf = tf * idf;
                    doc_norms[doc_id as usize] += tfidf * tfidf;
                    (doc_id, tfidf)
                })
                .collect();
            weighted.push((term, idf, plist));
        }
        for dn in doc_norms.iter_mut() {
            *dn = dn.sqrt();
            if *dn == 0.0 { *dn = 1.0; }
        }

        // Second pass: normalize
        let terms: Vec<TermEntry> = weighted
            .into_iter()
            .map(|(term, idf, plist)| {
                let postings: Vec<Posting> = plist
                    .into_iter()
                    .map(|(doc_id, tfidf)| Posting { doc_id, weight: tfidf / doc_norms[doc_id as usize] })
                    .collect();
                TermEntry { term, df: postings.len() as u32, idf, postings }
            })
            .collect();

        let index = SearchIndex {
            header: IndexHeader {
                tokenizer: self.config.tokenizer,
                idf: self.config.idf,
                built_at: self.config.built_at.clone(),
            },
            terms,
            docs: metas,
        };
        index.validate()?;

        let report = BuildReport {
            documents: index.docs.len(),
            terms: index.num_terms(),
            postings: index.num_postings(),
            unsearchable,
            untitled,
        };
        Ok((index, report))
    }

    fn weighted_tf(&self, doc: &Document) -> Vec<(String, f32)> {
        let w = self.config.weights;
        let mut tf: HashMap<String, f32> = HashMap::new();
        let mut add = |text: &str, weight: f32| {
            for term in self.tokenizer.terms(text) {
                *tf.entry(term).or_insert(0.0) += weight;
            }
        };
        add(&doc.title, w.title);
        for c in &doc.categories { add(c, w.categories); }
        for t in &doc.tags { add(t, w.tags); }
        add(&doc.excerpt, w.excerpt);
        // Only the per-term sums escape; sort so nothing depends on hash order.
        let mut out: Vec<(String, f32)> = tf.into_iter().collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl Default for IndexBuilder {
    fn default() -> Self {
        Self::new(BuildConfig::default())
    }
}

fn hint(doc: &Document) -> String {
    [&doc.id, &doc.url, &doc.title]
        .into_iter()
        .find(|s| !s.trim().is_empty())
        .cloned()
        .unwrap_or_default()
}

fn validate(docs: &[Document]) -> Result<(), BuildError> {
    let mut invalid = Vec::new();
    for (position, doc) in docs.iter().enumerate() {
        if doc.id.trim().is_empty() {
            invalid.push(RecordError { position, hint: hint(doc), missing: "id" });
        }
        if doc.url.trim().is_empty() {
            invalid.push(RecordError { position, hint: hint(doc), missing: "url" });
        }
    }
    if !invalid.is_empty() {
        for e in &invalid {
            tracing::error!(position = e.position, hint = %e.hint, missing = e.missing, "invalid record");
        }
        return Err(BuildError::InvalidDocuments(invalid));
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (position, doc) in docs.iter().enumerate() {
        if let Some(&first) = seen.get(doc.id.as_str()) {
            return Err(BuildError::DuplicateId { id: doc.id.clone(), first, second: position });
        }
        seen.insert(doc.id.as_str(), position);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str) -> Document {
        Document { id: id.into(), title: title.into(), url: format!("/{id}/"), ..Default::default() }
    }

    #[test]
    fn title_outweighs_excerpt() {
        let mut a = doc("a", "Rust notes");
        a.excerpt = "Nothing to see".into();
        let mut b = doc("b", "Nothing to see");
        b.excerpt = "rust".into();
        let (idx, _) = IndexBuilder::default().build(vec![a, b]).unwrap();
        let entry = idx.term(idx.term_id("rust").unwrap()).unwrap();
        let w: Vec<f32> = entry.postings.iter().map(|p| p.weight).collect();
        assert!(w[0] > w[1], "{w:?}");
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let mut no_url = doc("a", "A");
        no_url.url.clear();
        let no_id = Document { url: "/b/".into(), title: "B".into(), ..Default::default() };
        let err = IndexBuilder::default().build(vec![no_url, doc("c", "C"), no_id]).unwrap_err();
        match err {
            BuildError::InvalidDocuments(errs) => {
                assert_eq!(errs.len(), 2);
                assert_eq!((errs[0].position, errs[0].missing), (0, "url"));
                assert_eq!((errs[1].position, errs[1].missing, errs[1].hint.as_str()), (2, "id", "/b/"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn duplicate_id_fails() {
        let err = IndexBuilder::default().build(vec![doc("a", "A"), doc("b", "B"), doc("a", "C")]).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateId { ref id, first: 0, second: 2 } if id == "a"));
    }

    #[test]
    fn tokenless_document_is_kept_and_reported() {
        let (idx, report) = IndexBuilder::default().build(vec![doc("a", "Alpha"), doc("b", "—")]).unwrap();
        assert_eq!(idx.docs.len(), 2);
        assert_eq!(report.unsearchable, vec!["b".to_string()]);
    }

    #[test]
    fn stopword_title_is_reported() {
        let config = BuildConfig { tokenizer: TokenizerConfig { stem: true, stopwords: true }, ..Default::default() };
        let mut about = doc("about", "About me");
        about.excerpt = "Portfolio owner".into();
        let (_, report) = IndexBuilder::new(config).build(vec![about, doc("rust", "Rust notes")]).unwrap();
        assert_eq!(report.untitled, vec!["about".to_string()]);
        assert!(report.unsearchable.is_empty());

        let (_, report) = IndexBuilder::default().build(vec![doc("about", "About me")]).unwrap();
        assert!(report.untitled.is_empty());
    }

    #[test]
    fn build_time_is_rfc3339() {
        let config = BuildConfig::default().with_build_time(0);
        assert_eq!(config.built_at.as_deref(), Some("1970-01-01T00:00:00Z"));
    }

    #[test]
    fn postings_are_normalized() {
        let (idx, _) = IndexBuilder::default().build(vec![doc("a", "alpha beta"), doc("b", "beta gamma")]).unwrap();
        let norm: f32 = idx
            .terms
            .iter()
            .flat_map(|t| t.postings.iter())
            .filter(|p| p.doc_id == 0)
            .map(|p| p.weight * p.weight)
            .sum();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
