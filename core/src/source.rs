//! Loading content records produced by the site build.
//!
//! Accepted shapes: a JSON array (or single object), JSON lines, and the
//! generated `lunr-store.js` (`var store = [ ... ]`). Directories are walked and
//! their files loaded in sorted path order so builds stay reproducible.

use crate::error::SourceError;
use crate::Document;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Record as it appears in the store. Required fields are checked by the
/// builder so that every bad record can be reported at once.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    pub id: Option<String>,
    pub title: Option<String>,
    pub excerpt: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub categories: Vec<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    pub url: Option<String>,
    pub teaser: Option<String>,
}

/// `jsonify` renders a page without categories or tags as `null`.
fn null_as_empty<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(d)?.unwrap_or_default())
}

impl From<RawRecord> for Document {
    fn from(raw: RawRecord) -> Self {
        let url = raw.url.unwrap_or_default();
        let id = match raw.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => url.clone(),
        };
        Document {
            id,
            title: raw.title.unwrap_or_default(),
            excerpt: raw.excerpt.unwrap_or_default(),
            categories: raw.categories,
            tags: raw.tags,
            url,
            teaser: raw.teaser,
        }
    }
}

fn is_source_file(p: &Path) -> bool {
    matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl" | "js"))
}

/// Load every record under `input` (a file or a directory).
pub fn load_documents(input: &Path) -> Result<Vec<Document>, SourceError> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        // Links are followed so a dangling one fails the load instead of
        // being skipped as a non-file.
        for entry in WalkDir::new(input).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| SourceError::Io {
                path: e.path().unwrap_or(input).to_path_buf(),
                source: e.into(),
            })?;
            let p = entry.path();
            if p.is_file() && is_source_file(p) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        return Err(SourceError::Missing(input.to_path_buf()));
    }

    let mut docs = Vec::new();
    for file in files {
        let text = fs::read_to_string(&file).map_err(|source| SourceError::Io { path: file.clone(), source })?;
        let records = match file.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => parse_jsonl(&file, &text)?,
            Some("js") => parse_store(&file, &text)?,
            _ => parse_json(&file, &text)?,
        };
        tracing::debug!(path = %file.display(), records = records.len(), "loaded content records");
        docs.extend(records.into_iter().map(Document::from));
    }
    Ok(docs)
}

fn json_error(path: &Path, line: usize, source: serde_json::Error) -> SourceError {
    SourceError::Json { path: path.to_path_buf(), line, source }
}

/// A `.json` file holds either an array of records or a single record.
pub fn parse_json(path: &Path, text: &str) -> Result<Vec<RawRecord>, SourceError> {
    match text.trim_start().chars().next() {
        Some('[') => serde_json::from_str(text).map_err(|e| json_error(path, e.line(), e)),
        Some('{') => {
            let rec: RawRecord = serde_json::from_str(text).map_err(|e| json_error(path, e.line(), e))?;
            Ok(vec![rec])
        }
        _ => {
            // Valid JSON of the wrong shape gets its own error; anything else
            // reports where parsing broke.
            serde_json::from_str::<serde_json::Value>(text).map_err(|e| json_error(path, e.line(), e))?;
            Err(SourceError::NotRecords(path.to_path_buf()))
        }
    }
}

/// `var store = [ ... ]` as emitted by the lunr include of the site theme.
pub fn parse_store(path: &Path, text: &str) -> Result<Vec<RawRecord>, SourceError> {
    let (start, end) = match (text.find('['), text.rfind(']')) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => return Err(SourceError::NoStore(path.to_path_buf())),
    };
    // Line numbers in errors should point into the store file.
    let line_offset = text[..start].matches('\n').count();
    serde_json::from_str(&text[start..=end]).map_err(|e| json_error(path, e.line() + line_offset, e))
}
