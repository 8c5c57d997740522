use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sitesearch_core::persist::{index_file, load_index, DEFAULT_FILE_NAME};
use sitesearch_core::query::raw_terms;
use sitesearch_core::snippet::highlight;
use sitesearch_core::source::load_documents;
use sitesearch_core::tokenizer::TokenizerConfig;
use sitesearch_core::{build_and_save, BuildConfig, IdfMode, QueryEngine};
use tracing_subscriber::{fmt, EnvFilter};

use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sitesearch-indexer")]
#[command(about = "Build and inspect the static site search index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Idf {
    /// ln(1 + N/df)
    Smoothed,
    /// ln(N/df); terms present in every document score zero
    Raw,
}

impl From<Idf> for IdfMode {
    fn from(v: Idf) -> Self {
        match v {
            Idf::Smoothed => IdfMode::Smoothed,
            Idf::Raw => IdfMode::Raw,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a store file (.js/.json/.jsonl) or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Output index file
        #[arg(long, default_value = DEFAULT_FILE_NAME)]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = Idf::Smoothed)]
        idf: Idf,
        /// Drop English stopwords (queries for them then match nothing)
        #[arg(long, default_value_t = false)]
        stopwords: bool,
        /// Index surface forms instead of stems
        #[arg(long, default_value_t = false)]
        no_stem: bool,
        /// Maximum excerpt length kept for snippets
        #[arg(long, default_value_t = 300)]
        excerpt_chars: usize,
        /// Build timestamp to record (unix seconds); omitted when unset
        #[arg(long, env = "SOURCE_DATE_EPOCH")]
        built_at: Option<i64>,
    },
    /// Print header and statistics of an index
    Inspect {
        #[arg(long, default_value = DEFAULT_FILE_NAME)]
        index: PathBuf,
        /// How many of the most frequent terms to list
        #[arg(long, default_value_t = 10)]
        top_terms: usize,
    },
    /// Run a query against an index
    Query {
        #[arg(long, default_value = DEFAULT_FILE_NAME)]
        index: PathBuf,
        #[arg(short, long, default_value_t = 10)]
        k: usize,
        /// Emit JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
        query: Vec<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, idf, stopwords, no_stem, excerpt_chars, built_at } => {
            let mut config = BuildConfig {
                tokenizer: TokenizerConfig { stem: !no_stem, stopwords },
                idf: idf.into(),
                excerpt_chars,
                ..Default::default()
            };
            if let Some(secs) = built_at {
                config = config.with_build_time(secs);
            }
            build_index(&input, &output, config)
        }
        Commands::Inspect { index, top_terms } => inspect(&index, top_terms),
        Commands::Query { index, k, json, query } => run_query(&index, k, json, &query.join(" ")),
    }
}

fn build_index(input: &Path, output: &Path, config: BuildConfig) -> Result<()> {
    let docs = load_documents(input).with_context(|| format!("loading content records from {}", input.display()))?;
    tracing::info!(num_docs = docs.len(), input = %input.display(), "loaded content records");
    let report = build_and_save(docs, config, output)
        .with_context(|| format!("building index; {} left untouched", output.display()))?;
    for id in &report.unsearchable {
        eprintln!("warning: {id} has no indexable text and can't be found by any query");
    }
    for id in &report.untitled {
        eprintln!("warning: {id} can't be found by its title words");
    }
    println!(
        "indexed {} documents, {} terms, {} postings -> {}",
        report.documents,
        report.terms,
        report.postings,
        output.display()
    );
    Ok(())
}

fn inspect(path: &Path, top_terms: usize) -> Result<()> {
    let path = index_file(path);
    let index = load_index(&path).with_context(|| format!("loading {}", path.display()))?;
    let h = &index.header;
    println!("file:       {}", path.display());
    println!("documents:  {}", index.num_docs());
    println!("terms:      {}", index.num_terms());
    println!("postings:   {}", index.num_postings());
    println!("idf:        {:?}", h.idf);
    println!("stemming:   {}", h.tokenizer.stem);
    println!("stopwords:  {}", h.tokenizer.stopwords);
    println!("built at:   {}", h.built_at.as_deref().unwrap_or("-"));

    let mut by_df: Vec<_> = index.terms.iter().collect();
    by_df.sort_by(|a, b| b.df.cmp(&a.df).then_with(|| a.term.cmp(&b.term)));
    println!("top terms:");
    for t in by_df.into_iter().take(top_terms) {
        println!("  {:<20} df={} idf={:.3}", t.term, t.df, t.idf);
    }
    Ok(())
}

fn run_query(path: &Path, k: usize, json: bool, query: &str) -> Result<()> {
    let path = index_file(path);
    let engine = QueryEngine::new(load_index(&path).with_context(|| format!("loading {}", path.display()))?);
    let hits = engine.top(query, k);
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("no results for {query:?}");
    }
    let terms = raw_terms(query);
    for (rank, hit) in hits.iter().enumerate() {
        println!("{:>2}. {:.4}  {}  {}", rank + 1, hit.score, hit.title, hit.url);
        if !hit.snippet.is_empty() {
            println!("    {}", highlight(&hit.snippet, &terms));
        }
    }
    Ok(())
}
