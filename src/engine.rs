//! The top-level `Engine`: one value tying `Registry`, the connection pool,
//! the inverted index, and the statement cache together — no global state,
//! per spec §9 Design Notes (the original's `TrackerDBInterface` singleton
//! becomes a plain struct any number of which can coexist, e.g. in tests).

use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::db::{self, Pool};
use crate::error::Result;
use crate::index::{IndexTuning, InvertedIndex};
use crate::ontology::Registry;
use crate::sparql::{self, PreparedQuery, QueryResult, StatementCache};
use crate::term::TermParserConfig;
use crate::update::{self, UpdateReport};

pub struct Engine {
    registry: Arc<Registry>,
    pool: Pool,
    index: InvertedIndex,
    statement_cache: Mutex<StatementCache>,
    term_config: TermParserConfig,
}

impl Engine {
    /// Opens (creating if absent) the metadata database and word index at
    /// `project_root/.tracker-engine/`, loading `Config` and any ontology
    /// descriptors the caller has placed there.
    pub fn open(project_root: &Path) -> Result<Self> {
        let config = Config::load(project_root);
        let mut registry = Registry::builtin();
        let ontology_dir = project_root.join(".tracker-engine").join("ontology");
        if ontology_dir.is_dir() {
            registry.load_dir(&ontology_dir)?;
        }
        let registry = Arc::new(registry);

        let db_path = crate::config::default_db_path(project_root);
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let pool = db::open_pool(&db_path, Arc::clone(&registry))?;

        let index_path = crate::config::default_index_path(project_root);
        let tuning = IndexTuning {
            min_buckets: config.min_index_bucket_count_or_default(),
            max_buckets: config.max_index_bucket_count_or_default(),
            bucket_ratio: config.index_bucket_ratio_or_default(),
            max_file_size: config.max_index_file_size_or_default(),
        };
        let index = InvertedIndex::open(&index_path, tuning)?;

        let term_config = TermParserConfig {
            min_len: config.min_term_length_or_default(),
            max_len: config.max_term_length_or_default(),
            min_numeric_len: config.min_numeric_term_length_or_default(),
            enable_stemming: config.enable_stemming_or_default(),
        };

        Ok(Engine {
            registry,
            pool,
            index,
            statement_cache: Mutex::new(StatementCache::new(
                config.statement_cache_size_or_default(),
            )),
            term_config,
        })
    }

    /// An ephemeral, in-memory engine — used by the CLI's `--ephemeral` mode
    /// and by integration tests that don't want a file on disk.
    pub fn open_ephemeral() -> Result<Self> {
        let registry = Arc::new(Registry::builtin());
        let pool = db::open_memory_pool(Arc::clone(&registry))?;
        let index_dir = tempfile_index_dir()?;
        let index = InvertedIndex::open(&index_dir, IndexTuning::default())?;
        Ok(Engine {
            registry,
            pool,
            index,
            statement_cache: Mutex::new(StatementCache::new(128)),
            term_config: TermParserConfig::default(),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Copies ontology descriptor files into the project's persistent
    /// ontology directory for the *next* `Engine::open` to pick up. The
    /// registry is shared (behind `Arc`) with every pooled connection's
    /// customizer once opened, so it can't be hot-swapped into a running
    /// engine — this mirrors the original's own restriction that ontology
    /// changes take effect on the next database generation/open, not live.
    pub fn install_ontology_dir(project_root: &Path, source_dir: &Path) -> Result<()> {
        let target = project_root.join(".tracker-engine").join("ontology");
        std::fs::create_dir_all(&target)?;
        for entry in std::fs::read_dir(source_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                let dest = target.join(entry.file_name());
                std::fs::copy(&path, &dest)?;
            }
        }
        Ok(())
    }

    /// Compiles (or fetches from cache) and executes a `SELECT`/`ASK`
    /// query, per spec §6 "Entry points".
    pub fn query(&self, sparql_text: &str) -> Result<QueryResult> {
        self.query_cancellable(sparql_text, &CancellationToken::new())
    }

    /// Like [`Engine::query`], but polls `token` between result rows —
    /// cancel it from another thread to abort a long-running scan.
    pub fn query_cancellable(&self, sparql_text: &str, token: &CancellationToken) -> Result<QueryResult> {
        let prepared = self.prepare(sparql_text)?;
        let conn = self.pool.get()?;
        Ok(sparql::cursor::execute_query_cancellable(&conn, &prepared, token)?)
    }

    pub fn prepare(&self, sparql_text: &str) -> Result<PreparedQuery> {
        {
            let mut cache = self.statement_cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(sparql_text) {
                return Ok(hit);
            }
        }
        let prepared = sparql::prepare_query(&self.registry, sparql_text)?;
        let mut cache = self.statement_cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.insert(sparql_text.to_string(), prepared.clone());
        Ok(prepared)
    }

    /// Executes an `INSERT DATA`/`DELETE DATA`/`DELETE WHERE`/`MODIFY`
    /// update, differentially updating the inverted index as it goes.
    pub fn update(&self, sparql_text: &str) -> Result<UpdateReport> {
        self.update_cancellable(sparql_text, &CancellationToken::new())
    }

    /// Like [`Engine::update`], but polls `token` between per-triple write
    /// steps — cancel it from another thread to abort a long-running batch.
    pub fn update_cancellable(&self, sparql_text: &str, token: &CancellationToken) -> Result<UpdateReport> {
        let conn = self.pool.get()?;
        match update::execute_update_cancellable(&conn, &self.registry, &self.index, &self.term_config, sparql_text, token) {
            Ok(report) => Ok(report),
            Err(update::UpdateError::Interrupted) => Err(crate::error::EngineError::Interrupted),
            Err(e) => Err(e.into()),
        }
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn optimize_index(&self) -> Result<()> {
        self.index.optimize()?;
        Ok(())
    }
}

fn tempfile_index_dir() -> Result<std::path::PathBuf> {
    let dir = std::env::temp_dir().join(format!("tracker-engine-ephemeral-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("word-index.db"))
}
