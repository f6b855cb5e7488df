//! # tracker-engine
//!
//! An ontology-driven SPARQL-to-SQLite translator and on-disk inverted word
//! index for a desktop file-indexing/metadata search engine.
//!
//! Two subsystems carry the weight of the crate:
//!
//! - **SPARQL → SQL translator** ([`sparql`]): a recursive-descent visitor
//!   over `spargebra`'s parsed query tree, emitting one self-contained
//!   SQLite `SELECT`/`ASK` statement per query — property paths become
//!   recursive CTEs, graph patterns become joined/unioned derived tables,
//!   aggregates and built-ins map onto SQLite-native or custom scalar
//!   functions.
//! - **Inverted word index** ([`index`]): an on-disk, hash-bucketed
//!   term→postings store supporting append, differential score updates,
//!   ranked multi-term retrieval, and periodic bucket-count optimisation.
//!
//! These sit behind an ontology registry ([`ontology`]) that drives storage
//! routing, a term parser ([`term`]) that feeds the inverted index, and an
//! update executor ([`update`]) that keeps both in sync as SPARQL `INSERT`/
//! `DELETE`/`MODIFY` statements run. [`Engine`] ties all of it together.
//!
//! ```no_run
//! use tracker_engine::Engine;
//!
//! # fn main() -> tracker_engine::Result<()> {
//! let engine = Engine::open(std::path::Path::new("."))?;
//! engine.update("INSERT DATA { <file:///tmp/a.txt> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <nfo:FileDataObject> }")?;
//! let results = engine.query("SELECT ?f WHERE { ?f a <nfo:FileDataObject> }")?;
//! println!("{} file(s)", results.rows.len());
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod index;
pub mod ontology;
pub mod sparql;
pub mod term;
pub mod update;

pub use cancel::CancellationToken;
pub use config::Config;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use index::{IndexHit, IndexError, IndexTuning, InvertedIndex};
pub use ontology::{DataType, OntologyError, PropertyDef, Registry, ServiceDef};
pub use sparql::{prepare_query, PreparedQuery, QueryResult, TranslateError};
pub use term::{TermParser, TermParserConfig};
pub use update::{execute_update, execute_update_cancellable, UpdateError, UpdateReport};
