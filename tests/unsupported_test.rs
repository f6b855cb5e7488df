//! Syntactically valid forms intentionally left unimplemented.

mod common;

use common::TestEngine;

#[test]
fn values_clause_is_rejected_as_unsupported() {
    let engine = TestEngine::new();
    let err = engine
        .engine
        .query("SELECT ?x WHERE { VALUES ?x { <urn:a> <urn:b> } }")
        .expect_err("VALUES should be rejected");
    assert!(err.to_string().contains("unsupported"));
}

#[test]
fn bnode_function_is_rejected_as_unsupported() {
    let engine = TestEngine::new();
    let err = engine
        .engine
        .query("SELECT (BNODE() AS ?b) WHERE { <urn:a> <nie:title> ?t }")
        .expect_err("BNODE() should be rejected");
    assert!(err.to_string().contains("unsupported"));
}
