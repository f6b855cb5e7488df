//! Translation-time arena: table aliases and variable bindings.
//!
//! Bindings are tracked as a flat arena indexed by stable `usize` handles
//! rather than as a tree of parent-linked scope objects — the same shape
//! as the `ChunkId`/slot-map pattern in `store/helpers.rs`, avoiding a
//! doubly-linked parent-pointer context chain entirely.

use std::collections::HashMap;

use spargebra::term::Variable;

/// A projected variable's surface type, per spec §4.4 "Projection": the
/// raw SQL value a binding resolves to isn't always what a caller should
/// see — a resource binding is a `Resource.ID` integer until the outer
/// projection wraps it back into its URI, and boolean/date/datetime
/// values need their own string conversion. Anything else (literal text,
/// computed expressions, already-surfaced URIs) needs no wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    #[default]
    Other,
    Resource,
    Boolean,
    Date,
    DateTime,
}

/// A `FROM`/`JOIN`-able SQL source: a table name (or parenthesised
/// sub-select) plus the alias the translator assigned it.
#[derive(Debug, Clone)]
pub struct TripleSource {
    pub alias: String,
    /// `"Resource"`, `"Files"`, a CTE name, or a full `(SELECT ...)` text.
    pub relation: String,
}

/// Where a bound SPARQL variable's value currently lives in the emitted
/// SQL: a column reference on some already-joined alias.
#[derive(Debug, Clone)]
pub struct Binding {
    pub variable: Variable,
    pub sql_expr: String,
    pub kind: ValueKind,
}

/// Accumulates the pieces of one `SELECT` as the pattern tree is walked:
/// joined sources, join/filter predicates, and the variable→column map.
/// Methods return stable indices instead of references so the translator
/// can hold onto a binding across nested borrows of `self`.
#[derive(Debug, Default)]
pub struct QueryContext {
    sources: Vec<TripleSource>,
    predicates: Vec<String>,
    bindings: Vec<Binding>,
    var_index: HashMap<Variable, usize>,
    alias_counter: u32,
    cte_counter: u32,
}

impl QueryContext {
    pub fn new() -> Self {
        QueryContext::default()
    }

    pub fn fresh_alias(&mut self, prefix: &str) -> String {
        self.alias_counter += 1;
        format!("{prefix}{}", self.alias_counter)
    }

    pub fn fresh_cte_name(&mut self) -> String {
        self.cte_counter += 1;
        format!("path_cte_{}", self.cte_counter)
    }

    pub fn add_source(&mut self, relation: impl Into<String>, alias: impl Into<String>) {
        self.sources.push(TripleSource {
            relation: relation.into(),
            alias: alias.into(),
        });
    }

    pub fn add_predicate(&mut self, predicate: impl Into<String>) {
        self.predicates.push(predicate.into());
    }

    /// Record that `variable` resolves to `sql_expr`. If the variable was
    /// already bound (a repeated occurrence in the same BGP), instead emits
    /// a join-equality predicate between the old and new expressions — the
    /// SQL equivalent of SPARQL's "same variable must hold the same value"
    /// semantics for intra-BGP joins.
    pub fn bind(&mut self, variable: &Variable, sql_expr: impl Into<String>) -> usize {
        self.bind_typed(variable, sql_expr, ValueKind::Other)
    }

    /// Like `bind`, but records the surface type the bound column holds so
    /// the outer projection can wrap it correctly (spec §4.4).
    pub fn bind_typed(&mut self, variable: &Variable, sql_expr: impl Into<String>, kind: ValueKind) -> usize {
        let sql_expr = sql_expr.into();
        if let Some(&idx) = self.var_index.get(variable) {
            let existing = self.bindings[idx].sql_expr.clone();
            if existing != sql_expr {
                self.add_predicate(format!("{existing} = {sql_expr}"));
            }
            return idx;
        }
        let idx = self.bindings.len();
        self.bindings.push(Binding {
            variable: variable.clone(),
            sql_expr,
            kind,
        });
        self.var_index.insert(variable.clone(), idx);
        idx
    }

    pub fn lookup(&self, variable: &Variable) -> Option<&str> {
        self.var_index
            .get(variable)
            .map(|&idx| self.bindings[idx].sql_expr.as_str())
    }

    pub fn lookup_kind(&self, variable: &Variable) -> ValueKind {
        self.var_index
            .get(variable)
            .map(|&idx| self.bindings[idx].kind)
            .unwrap_or_default()
    }

    pub fn sources(&self) -> &[TripleSource] {
        &self.sources
    }

    pub fn predicates(&self) -> &[String] {
        &self.predicates
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }
}
