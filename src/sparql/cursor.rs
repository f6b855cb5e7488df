//! Query execution: prepared statements, result cursors, and the
//! statement-LRU cache (spec §9 Design Notes — replaces the original's
//! `TrackerDBStatement`/`TrackerDBCursor` class hierarchy with plain value
//! types plus a cache keyed on the emitted SQL text).

use std::num::NonZeroUsize;

use lru::LruCache;
use rusqlite::types::Value;
use rusqlite::Connection;

use crate::cancel::CancellationToken;
use crate::error::EngineError;

/// The compiled form of a `SELECT`/`ASK` query: one SQL statement plus
/// enough metadata to shape the result rows back into SPARQL solutions.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    pub sql: String,
    pub is_ask: bool,
    /// SPARQL variable names, in projection order.
    pub variables: Vec<String>,
    /// The `v_<name>` SQL column aliases matching `variables` 1:1.
    pub columns: Vec<String>,
}

/// One SPARQL solution: variable name → SQLite value. Kept as the dynamic
/// `rusqlite::types::Value` rather than coerced to `String` up front — a
/// column can still be an integer (COUNT/numeric properties) or NULL
/// (unbound OPTIONAL), and SQLite won't convert an INTEGER column through
/// a `String` getter.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    pub values: Vec<Value>,
}

impl Solution {
    /// Render a bound value the way the original's cursor API exposes
    /// column text (`NULL` unbound columns come back as `None`).
    pub fn text(&self, index: usize) -> Option<String> {
        match self.values.get(index)? {
            Value::Null => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Blob(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct QueryResult {
    pub variables: Vec<String>,
    pub rows: Vec<Solution>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Executes a prepared query against `conn` and materialises every row.
/// Desktop query results are small (bounded by `LIMIT`/solution modifiers
/// compiled into the SQL itself), so a streaming cursor isn't worth the
/// added API surface here — callers that need paging use SPARQL's own
/// `LIMIT`/`OFFSET`.
pub fn execute_query(conn: &Connection, prepared: &PreparedQuery) -> Result<QueryResult, EngineError> {
    execute_query_cancellable(conn, prepared, &CancellationToken::new())
}

/// Like [`execute_query`], but polls `token` between rows — the cursor
/// suspension point the cooperative-cancellation protocol calls for. On
/// cancellation the in-flight statement is dropped (which resets it) and
/// `EngineError::Interrupted` surfaces.
pub fn execute_query_cancellable(
    conn: &Connection,
    prepared: &PreparedQuery,
    token: &CancellationToken,
) -> Result<QueryResult, EngineError> {
    let mut stmt = conn.prepare(&prepared.sql)?;
    let column_count = prepared.columns.len();
    let mut rows_out = Vec::new();

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        token.check()?;
        let mut values = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let value: Value = row.get(i)?;
            values.push(value);
        }
        rows_out.push(Solution { values });
    }

    Ok(QueryResult {
        variables: prepared.variables.clone(),
        rows: rows_out,
    })
}

/// LRU cache of compiled-but-not-yet-executed SQL text, keyed on the
/// original SPARQL string. Avoids re-walking `spargebra`'s AST for queries
/// an application issues repeatedly (file-manager "refresh" polling is the
/// common case in the original).
pub struct StatementCache {
    cache: LruCache<String, PreparedQuery>,
}

impl StatementCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        StatementCache {
            cache: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, sparql: &str) -> Option<PreparedQuery> {
        self.cache.get(sparql).cloned()
    }

    pub fn insert(&mut self, sparql: String, prepared: PreparedQuery) {
        self.cache.put(sparql, prepared);
    }
}
