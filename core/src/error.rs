use std::fmt;
use std::path::PathBuf;

/// One rejected input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordError {
    /// Zero-based position in the input sequence.
    pub position: usize,
    /// Whatever identifies the record best: its id, else url, else title.
    pub hint: String,
    pub missing: &'static str,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record #{} ({:?}): missing {}", self.position, self.hint, self.missing)
    }
}

fn join(errors: &[RecordError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("{} invalid record(s): {}", .0.len(), join(.0))]
    InvalidDocuments(Vec<RecordError>),
    #[error("duplicate document id {id:?} at records #{first} and #{second}")]
    DuplicateId { id: String, first: usize, second: usize },
    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    #[error("index i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("index encoding: {0}")]
    Encode(#[from] bincode::Error),
    #[error("not a search index file (bad magic)")]
    BadMagic,
    #[error("unsupported index format version {found} (this build reads version {supported}); rebuild the index")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("index checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Checksum { stored: u32, computed: u32 },
    #[error("corrupt index: {0}")]
    Corrupt(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("reading {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("{path}:{line}: {source}")]
    Json { path: PathBuf, line: usize, source: serde_json::Error },
    #[error("{0}: no `[ ... ]` record array found")]
    NoStore(PathBuf),
    #[error("{0}: top-level JSON value is neither a record nor an array of records")]
    NotRecords(PathBuf),
    #[error("{0}: no such file or directory")]
    Missing(PathBuf),
}
