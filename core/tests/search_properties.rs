use sitesearch_core::persist::{encode_index, load_index, DEFAULT_FILE_NAME};
use sitesearch_core::source::load_documents;
use sitesearch_core::tokenizer::Tokenizer;
use sitesearch_core::{build_and_save, BuildConfig, BuildError, Document, IdfMode, IndexBuilder, QueryEngine, SourceError};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn store_docs() -> Vec<Document> {
    load_documents(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data/lunr-store.js"))).unwrap()
}

fn blog_docs() -> Vec<Document> {
    let post = |id: &str, title: &str, tags: &[&str]| Document {
        id: id.into(),
        title: title.into(),
        excerpt: format!("Notes about {title}"),
        categories: vec!["blog".into()],
        tags: tags.iter().map(|t| t.to_string()).collect(),
        url: format!("/blog/{id}/"),
        teaser: None,
    };
    vec![
        post("rust-async", "Async Rust in practice", &["rust", "async"]),
        post("postgres-tuning", "Tuning Postgres for 2024", &["postgres"]),
        post("about", "About", &[]),
        post("k8s", "Kubernetes: the hard parts", &["k8s", "devops"]),
    ]
}

#[test]
fn sample_store_portfolio_query_returns_both_posts() {
    let docs = store_docs();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].id, "/blog/order-tracking-first-steps/");
    assert_eq!(docs[1].id, "/blog/welcome-blog/");

    let engine = QueryEngine::new(IndexBuilder::default().build(docs).unwrap().0);
    let first = engine.top("portfolio", 10);
    let urls: Vec<&str> = first.iter().map(|h| h.url.as_str()).collect();
    assert_eq!(urls.len(), 2);
    assert!(urls.contains(&"/blog/order-tracking-first-steps/"));
    assert!(urls.contains(&"/blog/welcome-blog/"));
    assert!(first[0].score >= first[1].score);
    assert!(first.iter().all(|h| h.snippet.to_lowercase().contains("portfolio")));

    for _ in 0..5 {
        assert_eq!(engine.top("portfolio", 10), first);
    }
}

#[test]
fn portfolio_still_matches_with_raw_idf() {
    let config = BuildConfig { idf: IdfMode::Raw, ..Default::default() };
    let engine = QueryEngine::new(IndexBuilder::new(config).build(store_docs()).unwrap().0);
    assert_eq!(engine.search("portfolio").total(), 2);
}

#[test]
fn identical_input_builds_identical_bytes() {
    let a = IndexBuilder::default().build(store_docs()).unwrap().0;
    let b = IndexBuilder::default().build(store_docs()).unwrap().0;
    assert_eq!(encode_index(&a).unwrap(), encode_index(&b).unwrap());

    let dir = tempdir().unwrap();
    let (p1, p2) = (dir.path().join("one.bin"), dir.path().join("two.bin"));
    build_and_save(blog_docs(), BuildConfig::default(), &p1).unwrap();
    build_and_save(blog_docs(), BuildConfig::default(), &p2).unwrap();
    assert_eq!(fs::read(&p1).unwrap(), fs::read(&p2).unwrap());
}

#[test]
fn every_title_word_finds_its_document() {
    let mut docs = blog_docs();
    docs.extend(store_docs());
    let engine = QueryEngine::new(IndexBuilder::default().build(docs.clone()).unwrap().0);
    let tokenizer = Tokenizer::default();
    for (doc_id, doc) in docs.iter().enumerate() {
        let mut searchable = false;
        for word in doc.title.split_whitespace() {
            if tokenizer.tokenize(word).is_empty() { continue; }
            searchable = true;
            assert!(
                engine.search(word).any(|s| s.doc_id as usize == doc_id),
                "{word:?} did not find {:?}",
                doc.id
            );
        }
        assert!(searchable, "{:?} has no searchable title word", doc.id);
    }
}

#[test]
fn duplicate_ids_publish_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);
    let mut docs = blog_docs();
    let mut dup = docs[0].clone();
    dup.title = "Another title".into();
    docs.push(dup);

    let err = build_and_save(docs, BuildConfig::default(), &path).unwrap_err();
    assert!(matches!(err, BuildError::DuplicateId { first: 0, second: 4, .. }));
    assert!(!path.exists());
}

#[test]
fn failed_rebuild_keeps_previous_index() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(DEFAULT_FILE_NAME);
    build_and_save(blog_docs(), BuildConfig::default(), &path).unwrap();
    let before = fs::read(&path).unwrap();

    let mut broken = store_docs();
    broken[1].url.clear();
    broken[1].id = "welcome".into();
    assert!(matches!(
        build_and_save(broken, BuildConfig::default(), &path),
        Err(BuildError::InvalidDocuments(_))
    ));
    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(load_index(&path).unwrap().docs.len(), 4);
}

#[test]
fn empty_query_is_empty_not_error() {
    let engine = QueryEngine::new(IndexBuilder::default().build(blog_docs()).unwrap().0);
    assert_eq!(engine.search("").total(), 0);
    assert!(engine.top("", 10).is_empty());
    assert!(engine.top("?!", 10).is_empty());
}

#[test]
fn empty_input_builds_empty_index() {
    let (index, report) = IndexBuilder::default().build(Vec::new()).unwrap();
    assert_eq!(report.documents, 0);
    assert!(QueryEngine::new(index).top("anything", 3).is_empty());
}

#[test]
fn engine_is_shared_across_threads() {
    let engine = std::sync::Arc::new(QueryEngine::new(IndexBuilder::default().build(blog_docs()).unwrap().0));
    let expected = engine.top("postgres", 3);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let e = engine.clone();
            std::thread::spawn(move || e.top("postgres", 3))
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), expected);
    }
}

fn write_content_dir(root: &Path) {
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("b.jsonl"), "{\"url\":\"/b1/\",\"title\":\"Beta one\"}\n\n{\"url\":\"/b2/\",\"title\":\"Beta two\"}\n").unwrap();
    fs::write(root.join("a.json"), r#"[{"url":"/a/","title":"Alpha post","tags":null}]"#).unwrap();
    fs::write(root.join("sub").join("c.js"), "var store = [{\"url\":\"/c/\",\"title\":\"Gamma\"}]\n").unwrap();
    fs::write(root.join("notes.txt"), "not a record").unwrap();
}

#[test]
fn directory_input_loads_in_sorted_path_order() {
    let dir = tempdir().unwrap();
    let content = dir.path().join("content");
    write_content_dir(&content);

    let docs = load_documents(&content).unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["/a/", "/b1/", "/b2/", "/c/"]);

    let (p1, p2) = (dir.path().join("one.bin"), dir.path().join("two.bin"));
    build_and_save(load_documents(&content).unwrap(), BuildConfig::default(), &p1).unwrap();
    build_and_save(load_documents(&content).unwrap(), BuildConfig::default(), &p2).unwrap();
    assert_eq!(fs::read(&p1).unwrap(), fs::read(&p2).unwrap());
}

#[test]
fn scalar_json_file_fails_the_load() {
    let dir = tempdir().unwrap();
    write_content_dir(dir.path());
    fs::write(dir.path().join("broken.json"), "null").unwrap();
    assert!(matches!(load_documents(dir.path()), Err(SourceError::NotRecords(_))));
}

#[cfg(unix)]
#[test]
fn unreadable_entry_fails_the_load() {
    let dir = tempdir().unwrap();
    write_content_dir(dir.path());
    std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("sub").join("gone.json")).unwrap();
    match load_documents(dir.path()) {
        Err(SourceError::Io { path, .. }) => assert!(path.ends_with("sub/gone.json"), "{path:?}"),
        other => panic!("unexpected {other:?}"),
    }
}
