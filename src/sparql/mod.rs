//! SPARQL 1.1 → SQLite translator (C4).
//!
//! `spargebra` parses SPARQL text into a typed `Query`/`Update` tree; this
//! module walks that tree (see `translate`, the recursive-descent visitor)
//! and emits a single self-contained SQL statement against the schema
//! `db::schema` creates. Parsing itself — the grammar — is out of scope;
//! this crate only ever sees `spargebra`'s already-validated AST.

mod context;
pub mod cursor;
mod expr;
mod path;
mod translate;

use thiserror::Error;

pub use cursor::{PreparedQuery, QueryResult, StatementCache};

use context::ValueKind;
use crate::ontology::Registry;

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("failed to parse SPARQL: {0}")]
    Parse(#[from] spargebra::ParseError),
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    #[error("unknown class: {0}")]
    UnknownClass(String),
    #[error("unknown property: {0}")]
    UnknownProperty(String),
    #[error("variable ?{0} is referenced before being bound")]
    UnboundVariable(String),
}

/// Wraps a projected column in the string-conversion spec §4.4
/// "Projection" describes for non-plain-text surface types: a resource
/// binding is a `Resource.ID` integer until this turns it back into its
/// URI; boolean/date/datetime values get their own conversion.
fn project_column(col: &str, kind: ValueKind) -> String {
    match kind {
        ValueKind::Resource => format!("(SELECT Uri FROM Resource WHERE ID = {col})"),
        ValueKind::Boolean => {
            format!("(CASE WHEN {col} IS NULL THEN NULL WHEN {col} THEN 'true' ELSE 'false' END)")
        }
        ValueKind::Date => format!("strftime('%Y-%m-%d', {col}, 'unixepoch')"),
        ValueKind::DateTime => format!("SparqlFormatTime({col})"),
        ValueKind::Other => col.to_string(),
    }
}

/// Compile a `SELECT`/`ASK` query string into one SQL statement plus the
/// ordered list of output variable names, per spec §4 "Entry points".
pub fn prepare_query(
    registry: &Registry,
    sparql: &str,
) -> Result<PreparedQuery, TranslateError> {
    let query = spargebra::Query::parse(sparql, None)?;
    match query {
        spargebra::Query::Select { pattern, .. } => {
            let sub = translate::translate_graph_pattern(registry, &pattern)?;
            let columns: Vec<String> = sub.variables.iter().map(translate::var_col).collect();
            let projection = sub
                .variables
                .iter()
                .zip(columns.iter())
                .map(|(v, col)| format!("{} AS {col}", project_column(col, sub.kind_of(v))))
                .collect::<Vec<_>>()
                .join(", ");
            let projection = if projection.is_empty() { "*".to_string() } else { projection };
            Ok(PreparedQuery {
                sql: format!("SELECT {projection} FROM {}", sub.sql),
                is_ask: false,
                variables: sub.variables.iter().map(|v| v.as_str().to_string()).collect(),
                columns,
            })
        }
        spargebra::Query::Ask { pattern, .. } => {
            let sub = translate::translate_graph_pattern(registry, &pattern)?;
            Ok(PreparedQuery {
                sql: format!("SELECT EXISTS (SELECT 1 FROM {}) AS v_ask", sub.sql),
                is_ask: true,
                variables: vec!["ask".to_string()],
                columns: vec!["v_ask".to_string()],
            })
        }
        spargebra::Query::Describe { .. } => Err(TranslateError::Unsupported(
            "DESCRIBE is not supported".into(),
        )),
        spargebra::Query::Construct { .. } => Err(TranslateError::Unsupported(
            "CONSTRUCT is not supported".into(),
        )),
    }
}

/// Re-exported for `update::executor`, which needs the same pattern
/// visitor for a `DeleteInsert`'s `WHERE` clause.
pub(crate) use translate::translate_graph_pattern;
pub(crate) use translate::var_col;
