//! Simple SELECT and OPTIONAL queries over plain (non-indexed) triples.

mod common;

use common::{col, TestEngine};

#[test]
fn simple_select_returns_inserted_file() {
    let engine = TestEngine::new();
    engine.update(
        "INSERT DATA { <file:///tmp/a.txt> a <nfo:FileDataObject> ; \
         <nie:title> \"alpha\" }",
    );

    let result = engine.query("SELECT ?f WHERE { ?f a <nfo:FileDataObject> }");
    assert_eq!(result.rows.len(), 1);
    let f = col(&result, "f");
    assert_eq!(result.rows[0].text(f).as_deref(), Some("file:///tmp/a.txt"));
}

#[test]
fn select_with_literal_filter() {
    let engine = TestEngine::new();
    engine.update(
        "INSERT DATA { <file:///tmp/a.txt> a <nfo:FileDataObject> ; <nie:title> \"alpha\" . \
         <file:///tmp/b.txt> a <nfo:FileDataObject> ; <nie:title> \"beta\" }",
    );

    let result = engine.query(
        "SELECT ?f WHERE { ?f <nie:title> ?t . FILTER(?t = \"beta\") }",
    );
    assert_eq!(result.rows.len(), 1);
    let f = col(&result, "f");
    assert_eq!(result.rows[0].text(f).as_deref(), Some("file:///tmp/b.txt"));
}

#[test]
fn optional_projects_null_when_unmatched() {
    let engine = TestEngine::new();
    engine.update(
        "INSERT DATA { <file:///tmp/a.txt> a <nfo:FileDataObject> ; <nie:title> \"alpha\" . \
         <file:///tmp/b.txt> a <nfo:FileDataObject> }",
    );

    let result = engine.query(
        "SELECT ?f ?t WHERE { ?f a <nfo:FileDataObject> OPTIONAL { ?f <nie:title> ?t } } ORDER BY ?f",
    );
    assert_eq!(result.rows.len(), 2);
    let f = col(&result, "f");
    let t = col(&result, "t");
    assert_eq!(result.rows[0].text(f).as_deref(), Some("file:///tmp/a.txt"));
    assert_eq!(result.rows[0].text(t).as_deref(), Some("alpha"));
    assert_eq!(result.rows[1].text(f).as_deref(), Some("file:///tmp/b.txt"));
    assert_eq!(result.rows[1].text(t), None);
}

#[test]
fn ask_reports_existence() {
    let engine = TestEngine::new();
    engine.update("INSERT DATA { <file:///tmp/a.txt> a <nfo:FileDataObject> }");

    let present = engine.query("ASK { ?f a <nfo:FileDataObject> }");
    assert_eq!(present.rows[0].text(0).as_deref(), Some("1"));

    let absent = engine.query("ASK { ?f a <nmo:Email> }");
    assert_eq!(absent.rows[0].text(0).as_deref(), Some("0"));
}
