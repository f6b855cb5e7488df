//! Common test fixtures and helpers.
//!
//! Usage in test files:
//! ```ignore
//! mod common;
//! use common::TestEngine;
//! ```

use tempfile::TempDir;
use tracker_engine::{Engine, QueryResult};

/// A project-backed engine with automatic cleanup.
///
/// Wraps an `Engine` with its backing `TempDir`, ensuring the directory
/// (and the SQLite file/word index under it) lives as long as the engine
/// is in use.
pub struct TestEngine {
    pub engine: Engine,
    _dir: TempDir,
}

impl TestEngine {
    /// Open a fresh engine rooted in a new temporary project directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let engine = Engine::open(dir.path()).expect("failed to open engine");
        TestEngine { engine, _dir: dir }
    }

    pub fn query(&self, sparql: &str) -> QueryResult {
        self.engine.query(sparql).expect("query failed")
    }

    pub fn update(&self, sparql: &str) {
        self.engine.update(sparql).expect("update failed");
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

/// Column index of `var` in a result set's projection, panicking if absent
/// (every test query names its own variables, so this is always a bug in
/// the test itself if it fails).
pub fn col(result: &QueryResult, var: &str) -> usize {
    result
        .variables
        .iter()
        .position(|v| v == var)
        .unwrap_or_else(|| panic!("query result has no variable ?{var}"))
}
