//! Cooperative cancellation of in-flight query/update calls.

mod common;

use common::TestEngine;
use tracker_engine::{CancellationToken, EngineError};

#[test]
fn pre_cancelled_token_interrupts_a_query() {
    let engine = TestEngine::new();
    engine.update("INSERT DATA { <urn:a> <nie:title> \"hello\" }");

    let token = CancellationToken::new();
    token.cancel();

    let err = engine
        .engine
        .query_cancellable("SELECT ?t WHERE { <urn:a> <nie:title> ?t }", &token)
        .expect_err("cancelled token should interrupt the query");
    assert!(matches!(err, EngineError::Interrupted));
}

#[test]
fn pre_cancelled_token_interrupts_an_update() {
    let engine = TestEngine::new();

    let token = CancellationToken::new();
    token.cancel();

    let err = engine
        .engine
        .update_cancellable("INSERT DATA { <urn:a> <nie:title> \"hello\" }", &token)
        .expect_err("cancelled token should interrupt the update");
    assert!(matches!(err, EngineError::Interrupted));
}

#[test]
fn uncancelled_token_runs_normally() {
    let engine = TestEngine::new();
    let token = CancellationToken::new();

    engine
        .engine
        .update_cancellable("INSERT DATA { <urn:a> <nie:title> \"hello\" }", &token)
        .expect("update should succeed");

    let result = engine
        .engine
        .query_cancellable("SELECT ?t WHERE { <urn:a> <nie:title> ?t }", &token)
        .expect("query should succeed");
    assert_eq!(result.rows.len(), 1);
}
