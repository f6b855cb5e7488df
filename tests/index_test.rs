//! Differential word-index updates driven by `DELETE`/`INSERT` modifies.

mod common;

use common::TestEngine;

fn subject_id(engine: &TestEngine, uri: &str) -> u32 {
    let result = engine.query(&format!(
        "PREFIX tracker: <http://www.tracker-project.org/ontologies/tracker#> \
         SELECT (tracker:id(?f) AS ?id) WHERE {{ ?f a <nfo:FileDataObject> . FILTER(?f = <{uri}>) }}"
    ));
    assert_eq!(result.rows.len(), 1);
    let id_col = result.variables.iter().position(|v| v == "id").unwrap();
    result.rows[0]
        .text(id_col)
        .expect("id bound")
        .parse()
        .expect("id is numeric")
}

#[test]
fn replacing_plain_text_content_updates_postings_for_both_terms() {
    let engine = TestEngine::new();
    engine.update(
        "INSERT DATA { <file:///tmp/c.txt> a <nfo:FileDataObject> ; \
         <nie:plainTextContent> \"hello world\" }",
    );
    let id = subject_id(&engine, "file:///tmp/c.txt");

    let (hits, _) = engine
        .engine
        .index()
        .read_single_term("hello", 0, 255, 0, 100, false)
        .expect("read hello");
    assert!(hits.iter().any(|h| h.service_id == id));
    let (hits, _) = engine
        .engine
        .index()
        .read_single_term("world", 0, 255, 0, 100, false)
        .expect("read world");
    assert!(hits.iter().any(|h| h.service_id == id));

    engine.update(
        "DELETE { <file:///tmp/c.txt> <nie:plainTextContent> ?old } \
         INSERT { <file:///tmp/c.txt> <nie:plainTextContent> \"goodbye universe\" } \
         WHERE { <file:///tmp/c.txt> <nie:plainTextContent> ?old }",
    );

    let (hits, _) = engine
        .engine
        .index()
        .read_single_term("hello", 0, 255, 0, 100, false)
        .expect("read hello after replace");
    assert!(!hits.iter().any(|h| h.service_id == id));
    let (hits, _) = engine
        .engine
        .index()
        .read_single_term("world", 0, 255, 0, 100, false)
        .expect("read world after replace");
    assert!(!hits.iter().any(|h| h.service_id == id));

    let (hits, _) = engine
        .engine
        .index()
        .read_single_term("goodbye", 0, 255, 0, 100, false)
        .expect("read goodbye");
    assert!(hits.iter().any(|h| h.service_id == id));
    let (hits, _) = engine
        .engine
        .index()
        .read_single_term("universe", 0, 255, 0, 100, false)
        .expect("read universe");
    assert!(hits.iter().any(|h| h.service_id == id));
}
