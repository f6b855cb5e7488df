//! Blank-node minting on `INSERT DATA` and replaying the inserted graph.

mod common;

use common::{col, TestEngine};

#[test]
fn insert_data_mints_blank_nodes_and_replay_finds_them() {
    let engine = TestEngine::new();
    let report = engine
        .engine
        .update(
            "INSERT DATA { _:a <nie:title> \"A\" ; <nco:creator> _:b . \
             _:b <nie:title> \"B\" }",
        )
        .expect("update failed");

    assert_eq!(report.minted_blank_nodes.len(), 2);
    let a_uri = report.minted_blank_nodes.get("a").expect("label a minted");
    let b_uri = report.minted_blank_nodes.get("b").expect("label b minted");
    assert!(a_uri.starts_with("urn:tracker:bnode:"));
    assert!(b_uri.starts_with("urn:tracker:bnode:"));
    assert_ne!(a_uri, b_uri);

    let result = engine.query("SELECT ?x ?y ?n WHERE { ?x <nco:creator> ?y . ?y <nie:title> ?n }");
    assert_eq!(result.rows.len(), 1);
    let (x, y, n) = (col(&result, "x"), col(&result, "y"), col(&result, "n"));
    assert_eq!(result.rows[0].text(x).as_deref(), Some(a_uri.as_str()));
    assert_eq!(result.rows[0].text(y).as_deref(), Some(b_uri.as_str()));
    assert_eq!(result.rows[0].text(n).as_deref(), Some("B"));
}
