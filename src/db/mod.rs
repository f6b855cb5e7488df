//! Connection pooling and schema management (ambient stack).
//!
//! Grounded on the `store::open` pragma set — WAL, foreign keys,
//! busy timeout, normal sync, a sized page cache, in-memory temp store —
//! re-expressed against `rusqlite`+`r2d2` instead of sqlx (see DESIGN.md):
//! C5's bulk triple INSERT/DELETE batches need `params_from_iter` over a
//! runtime-sized parameter list, which sqlx's compile-time query macros
//! don't offer.

pub mod schema;

use std::path::Path;
use std::sync::Arc;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::EngineError;
use crate::ontology::Registry;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Applies the schema (once, idempotently) and registers scalar
/// functions/collation on every connection the pool hands out — the
/// `rusqlite` analogue of a sqlx `after_connect` hook.
#[derive(Debug)]
struct Customizer {
    registry: Arc<Registry>,
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for Customizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;\n\
             PRAGMA journal_mode = WAL;\n\
             PRAGMA busy_timeout = 5000;\n\
             PRAGMA synchronous = NORMAL;\n\
             PRAGMA cache_size = -16384;\n\
             PRAGMA temp_store = MEMORY;",
        )?;
        schema::apply_schema(conn, &self.registry)?;
        schema::register_functions(conn)?;
        Ok(())
    }
}

/// Opens (creating if absent) the on-disk database at `path` and returns a
/// pool of ready-to-use connections, schema applied and functions
/// registered on each.
pub fn open_pool(path: &Path, registry: Arc<Registry>) -> Result<Pool, EngineError> {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(4)
        .connection_customizer(Box::new(Customizer { registry }))
        .build(manager)?;
    Ok(pool)
}

/// Opens an in-memory database, for tests and the CLI's `--ephemeral` mode.
pub fn open_memory_pool(registry: Arc<Registry>) -> Result<Pool, EngineError> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .connection_customizer(Box::new(Customizer { registry }))
        .build(manager)?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_memory_pool_applies_schema_and_functions() {
        let registry = Arc::new(Registry::builtin());
        let pool = open_memory_pool(registry).expect("pool opens");
        let conn = pool.get().expect("connection checks out");
        let matched: bool = conn
            .query_row("SELECT SparqlRegex('hello', 'ell', '')", [], |row| row.get(0))
            .expect("SparqlRegex callable");
        assert!(matched);

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE name = 'tracker_triples'",
                [],
                |row| row.get(0),
            )
            .expect("tracker_triples view exists");
        assert_eq!(count, 1);
    }
}
