//! Static site search: build an inverted index from content records offline,
//! then answer free-text queries against the serialized artifact.

pub mod builder;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod snippet;
pub mod source;
pub mod tokenizer;

pub use builder::{BuildConfig, BuildReport, FieldWeights, IndexBuilder};
pub use error::{BuildError, IndexError, RecordError, SourceError};
pub use index::{DocId, DocMeta, Document, IdfMode, IndexHeader, Posting, SearchIndex, TermEntry, TermId};
pub use query::{Hit, Hits, QueryEngine, ScoredDoc};

use std::path::Path;

/// Build from `docs` and publish to `path`. Nothing is written unless the whole
/// batch indexes cleanly; an existing file at `path` stays in place on error.
pub fn build_and_save<I>(docs: I, config: BuildConfig, path: &Path) -> Result<BuildReport, BuildError>
where
    I: IntoIterator<Item = Document>,
{
    let (index, report) = IndexBuilder::new(config).build(docs)?;
    persist::save_index(path, &index)?;
    tracing::info!(
        documents = report.documents,
        terms = report.terms,
        postings = report.postings,
        unsearchable = report.unsearchable.len(),
        "index build complete"
    );
    Ok(report)
}
