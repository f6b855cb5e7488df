//! Property path compilation (part of C4, spec §4.4).
//!
//! Each of the seven path-expression shapes compiles to a recursive CTE (or
//! a plain join for the trivial `NamedNode`/`Inverse` cases) that resolves
//! to a two-column `(start_id, end_id)` relation. Negated property sets are
//! out of scope (spec §2 Non-goals); every other shape nests, since the
//! CTE's own body is itself built by recursing into this module.

use spargebra::algebra::PropertyPathExpression;

use super::context::QueryContext;
use super::expr::sql_quote;
use super::TranslateError;
use crate::ontology::Registry;

/// A compiled path: a CTE definition (`WITH <name> AS (...)`) plus the
/// name to join against, selecting `(start_id, end_id)` pairs that satisfy
/// the path.
pub struct CompiledPath {
    /// `None` for the trivial single-predicate case, where the caller joins
    /// directly against `tracker_triples` instead of a CTE.
    pub cte: Option<(String, String)>,
    pub relation: String,
}

pub fn compile_path(
    ctx: &mut QueryContext,
    registry: &Registry,
    path: &PropertyPathExpression,
) -> Result<CompiledPath, TranslateError> {
    use PropertyPathExpression::*;
    match path {
        NamedNode(predicate) => {
            let prop = registry
                .property_of(predicate.as_str())
                .ok_or_else(|| TranslateError::UnknownProperty(predicate.as_str().to_string()))?;
            Ok(CompiledPath {
                cte: None,
                relation: format!(
                    "(SELECT SubjectID AS start_id, ObjectID AS end_id FROM tracker_triples WHERE PropertyID = {})",
                    prop.id
                ),
            })
        }
        Reverse(inner) => {
            let compiled = compile_path(ctx, registry, inner)?;
            Ok(CompiledPath {
                cte: compiled.cte,
                relation: format!(
                    "(SELECT end_id AS start_id, start_id AS end_id FROM {})",
                    compiled.relation
                ),
            })
        }
        Sequence(left, right) => {
            let l = compile_path(ctx, registry, left)?;
            let r = compile_path(ctx, registry, right)?;
            let name = ctx.fresh_cte_name();
            let body = format!(
                "SELECT l.start_id AS start_id, r.end_id AS end_id FROM {} l JOIN {} r ON l.end_id = r.start_id",
                l.relation, r.relation
            );
            Ok(CompiledPath {
                cte: Some((name.clone(), body)),
                relation: name,
            })
        }
        Alternative(left, right) => {
            let l = compile_path(ctx, registry, left)?;
            let r = compile_path(ctx, registry, right)?;
            let name = ctx.fresh_cte_name();
            let body = format!(
                "SELECT start_id, end_id FROM {} UNION SELECT start_id, end_id FROM {}",
                l.relation, r.relation
            );
            Ok(CompiledPath {
                cte: Some((name.clone(), body)),
                relation: name,
            })
        }
        ZeroOrMore(inner) => compile_transitive(ctx, registry, inner, true),
        OneOrMore(inner) => compile_transitive(ctx, registry, inner, false),
        ZeroOrOne(inner) => {
            let compiled = compile_path(ctx, registry, inner)?;
            let name = ctx.fresh_cte_name();
            let body = format!(
                "SELECT start_id AS start_id, start_id AS end_id FROM {rel} \
                 UNION ALL SELECT start_id, end_id FROM {rel}",
                rel = compiled.relation
            );
            Ok(CompiledPath {
                cte: Some((name.clone(), body)),
                relation: name,
            })
        }
        NegatedPropertySet(_) => Err(TranslateError::Unsupported(
            "negated property set path".into(),
        )),
    }
}

/// `path+` and `path*` both resolve via the same recursive-CTE shape (a
/// standard transitive closure over the base relation); `path*` unions in
/// the zero-length reflexive pairs.
fn compile_transitive(
    ctx: &mut QueryContext,
    registry: &Registry,
    inner: &PropertyPathExpression,
    zero_allowed: bool,
) -> Result<CompiledPath, TranslateError> {
    let base = compile_path(ctx, registry, inner)?;
    let name = ctx.fresh_cte_name();

    let mut prelude = String::new();
    if let Some((cte_name, cte_body)) = &base.cte {
        prelude.push_str(&format!("{cte_name} AS ({cte_body}), "));
    }

    let reflexive = if zero_allowed {
        format!(
            "SELECT start_id AS start_id, start_id AS end_id FROM {} UNION ",
            base.relation
        )
    } else {
        String::new()
    };

    let body = format!(
        "{prelude}{name}(start_id, end_id) AS (\n\
             {reflexive}SELECT start_id, end_id FROM {base_rel}\n\
             UNION\n\
             SELECT t.start_id, b.end_id FROM {name} t JOIN {base_rel} b ON t.end_id = b.start_id\n\
         )",
        base_rel = base.relation,
    );

    Ok(CompiledPath {
        cte: Some((name.clone(), body)),
        relation: name,
    })
}

/// Render `start`/`end` as a complete joinable fragment: the path's CTE
/// (if any) prefixed with `WITH RECURSIVE`, plus a `WHERE`-ready predicate
/// binding the endpoints to the given SQL value expressions.
pub fn render_path_join(
    compiled: &CompiledPath,
    start_expr: &str,
    end_expr: &str,
) -> (Option<String>, String) {
    let cte_sql = compiled
        .cte
        .as_ref()
        .map(|(name, body)| format!("{name} AS ({body})"));
    let predicate = format!(
        "EXISTS (SELECT 1 FROM {} __p WHERE __p.start_id = {start_expr} AND __p.end_id = {end_expr})",
        compiled.relation
    );
    (cte_sql, predicate)
}

#[allow(dead_code)]
fn literal_id_subselect(uri: &str) -> String {
    format!("(SELECT ID FROM Resource WHERE Uri = {})", sql_quote(uri))
}
