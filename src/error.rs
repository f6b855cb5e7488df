//! Unified error taxonomy.
//!
//! Mirrors the kinds in spec §7: parse / unsupported / unknown-class /
//! unknown-property / type / query / interrupted / no-space / io / corrupt.
//! Each subsystem has its own error enum (see `ontology::OntologyError`,
//! `index::IndexError`, `sparql::TranslateError`); this is the aggregator
//! every public `Engine` method returns, the same role
//! `AnalysisError` plays over `StoreError`/`EmbedderError` elsewhere.

use thiserror::Error;

use crate::index::IndexError;
use crate::ontology::OntologyError;
use crate::sparql::TranslateError;
use crate::update::UpdateError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("unknown class: {0}")]
    UnknownClass(String),

    #[error("unknown property: {0}")]
    UnknownProperty(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("interrupted")]
    Interrupted,

    #[error("no space left on device")]
    NoSpace,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt: {0}")]
    Corrupt(String),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error(transparent)]
    Ontology(#[from] OntologyError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Update(#[from] UpdateError),
}

impl EngineError {
    /// True if this error kind is the differential-index "best effort"
    /// class per spec §7: logged, but the enclosing update still commits.
    pub fn is_index_advisory(&self) -> bool {
        matches!(self, EngineError::Index(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
