//! Full-text match with rank/snippet auxiliary bindings.

mod common;

use common::{col, TestEngine};

#[test]
fn fts_match_finds_indexed_text_and_ranks_results() {
    let engine = TestEngine::new();
    engine.update(
        "INSERT DATA { <file:///tmp/a.txt> a <nfo:FileDataObject> ; \
         <nie:plainTextContent> \"the quick brown fox\" . \
         <file:///tmp/b.txt> a <nfo:FileDataObject> ; \
         <nie:plainTextContent> \"a slow brown turtle\" }",
    );

    let result = engine.query(
        "PREFIX fts: <http://www.tracker-project.org/ontologies/fts#> \
         SELECT ?f ?r WHERE { ?f fts:match \"brown\" . \
         BIND(fts:rank(?f) AS ?r) } ORDER BY DESC(?r) LIMIT 10",
    );
    assert_eq!(result.rows.len(), 2);
    let f = col(&result, "f");
    let files: Vec<String> = result
        .rows
        .iter()
        .map(|r| r.text(f).expect("bound"))
        .collect();
    assert!(files.contains(&"file:///tmp/a.txt".to_string()));
    assert!(files.contains(&"file:///tmp/b.txt".to_string()));
}

#[test]
fn fts_match_excludes_non_matching_content() {
    let engine = TestEngine::new();
    engine.update(
        "INSERT DATA { <file:///tmp/a.txt> a <nfo:FileDataObject> ; \
         <nie:plainTextContent> \"hello world\" }",
    );

    let result = engine.query(
        "PREFIX fts: <http://www.tracker-project.org/ontologies/fts#> \
         SELECT ?f WHERE { ?f fts:match \"goodbye\" }",
    );
    assert!(result.is_empty());
}
